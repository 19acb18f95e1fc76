use anyhow::Result;
use chromiumoxide::{Browser, Page};
use futures::StreamExt;
use tokio::time::sleep;
use tracing::{debug, error, info};

/// 连接到已开启远程调试的浏览器并获取页面
///
/// 优先复用 URL 以 `start_url` 所在站点开头的标签页（通常已登录），
/// 否则新建页面并导航到 `start_url`
pub async fn connect_to_browser_and_page(port: u16, start_url: &str) -> Result<(Browser, Page)> {
    let browser_url = format!("http://localhost:{}", port);
    info!("正在连接到浏览器: {}", browser_url);

    let (browser, mut handler) = Browser::connect(&browser_url).await.map_err(|e| {
        error!("连接浏览器失败: {}", e);
        e
    })?;
    debug!("浏览器连接成功");

    // 在后台处理浏览器事件
    tokio::spawn(async move {
        while let Some(h) = handler.next().await {
            if h.is_err() {
                break;
            }
        }
    });

    // 等待浏览器状态同步
    sleep(tokio::time::Duration::from_millis(300)).await;

    let pages = browser.pages().await?;
    debug!("获取到 {} 个页面", pages.len());

    let origin = site_origin(start_url);
    for p in pages.iter() {
        if let Ok(Some(url)) = p.url().await {
            debug!("检查页面: {}", url);
            if !origin.is_empty() && url.starts_with(origin) {
                info!("✓ 复用已打开的页面: {}", url);
                return Ok((browser, p.clone()));
            }
        }
    }

    debug!("创建新页面并导航到: {}", start_url);
    let page = browser.new_page("about:blank").await.map_err(|e| {
        error!("创建新页面失败: {}", e);
        e
    })?;
    page.goto(start_url).await.map_err(|e| {
        error!("导航到 {} 失败: {}", start_url, e);
        e
    })?;
    info!("已导航到: {}", start_url);

    Ok((browser, page))
}

/// 取出 `scheme://host` 部分
fn site_origin(url: &str) -> &str {
    let Some(scheme_end) = url.find("://") else {
        return "";
    };
    let rest = &url[scheme_end + 3..];
    match rest.find('/') {
        Some(path_start) => &url[..scheme_end + 3 + path_start],
        None => url,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_site_origin() {
        assert_eq!(
            site_origin("https://www.linkedin.com/jobs/search"),
            "https://www.linkedin.com"
        );
        assert_eq!(site_origin("https://example.com"), "https://example.com");
        assert_eq!(site_origin("about:blank"), "");
    }
}

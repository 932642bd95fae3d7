//! 分页累积：第一页声明的总数是循环终止的依据。

use std::future::Future;

use tracing::{debug, warn};

/// 一页数据及其声明的总数
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: u64) -> Self {
        Self { items, total }
    }
}

/// 总页数 = ceil(total / per_page)
pub fn page_count(total: u64, per_page: u32) -> u32 {
    if per_page == 0 {
        return 0;
    }
    total.div_ceil(per_page as u64) as u32
}

/// 从第 1 页开始逐页请求，直到累积数量达到第一页声明的总数；
/// 若某页为空则提前结束，避免服务端异常时死循环
pub async fn accumulate_until_total<T, E, F, Fut>(what: &str, mut fetch: F) -> Result<Vec<T>, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Page<T>, E>>,
{
    let first = fetch(1).await?;
    let declared = first.total;
    let mut page = 1;
    let mut last_len = first.items.len();
    let mut items = first.items;
    debug!("{} 第 {} 页: {} 条，声明总数 {}", what, page, last_len, declared);

    while (items.len() as u64) < declared {
        if last_len == 0 {
            warn!(
                "{} 第 {} 页为空，已累积 {}/{}，提前结束",
                what, page, items.len(), declared
            );
            break;
        }
        page += 1;
        let next = fetch(page).await?;
        last_len = next.items.len();
        debug!("{} 第 {} 页: {} 条", what, page, last_len);
        items.extend(next.items);
    }

    Ok(items)
}

/// 剧集分页：已有的第一页 + 第 2..=ceil(total/per_page) 页，按响应顺序拼接
pub async fn fetch_remaining_pages<T, E, F, Fut>(
    what: &str,
    first: Page<T>,
    per_page: u32,
    mut fetch: F,
) -> Result<Vec<T>, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Page<T>, E>>,
{
    let declared = first.total;
    let pages = page_count(declared, per_page);
    let mut items = first.items;

    for page in 2..=pages {
        let next = fetch(page).await?;
        if next.items.is_empty() {
            warn!("{} 第 {}/{} 页为空，提前结束", what, page, pages);
            break;
        }
        items.extend(next.items);
    }

    if (items.len() as u64) < declared {
        warn!("{} 数量不足: {}/{}", what, items.len(), declared);
    }
    Ok(items)
}

use serde::{Deserialize, Serialize};

use crate::error::AppError;

const MAX_PAGE_SIZE: usize = 100;

#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<usize>,
    pub page_size: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub count: usize,
    pub next: Option<usize>,
    pub previous: Option<usize>,
    pub results: Vec<T>,
}

/// Slices an already ordered list into one page.
pub fn paginate<T>(items: Vec<T>, params: &PageParams, default_size: usize) -> Result<Page<T>, AppError> {
    let page_size = params
        .page_size
        .filter(|size| *size > 0)
        .unwrap_or(default_size)
        .clamp(1, MAX_PAGE_SIZE);
    let page = params.page.unwrap_or(1);

    let count = items.len();
    let last_page = count.div_ceil(page_size).max(1);
    if page == 0 || page > last_page {
        return Err(AppError::NotFound("Invalid page.".to_string()));
    }

    let results = items
        .into_iter()
        .skip((page - 1) * page_size)
        .take(page_size)
        .collect();

    Ok(Page {
        count,
        next: (page < last_page).then_some(page + 1),
        previous: (page > 1).then_some(page - 1),
        results,
    })
}

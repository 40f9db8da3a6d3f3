use std::future::Future;

/// Walks an offset/limit list endpoint until it returns a short page.
///
/// `fetch` receives the current offset and the page size and yields one page
/// of items. A page strictly shorter than `page_size` (including an empty
/// one) terminates the walk; items are returned concatenated in request
/// order. Errors from `fetch` propagate unchanged.
pub async fn fetch_all_pages<T, E, F, Fut>(page_size: usize, mut fetch: F) -> Result<Vec<T>, E>
where
    F: FnMut(usize, usize) -> Fut,
    Fut: Future<Output = Result<Vec<T>, E>>,
{
    let mut items = Vec::new();
    let mut offset = 0;

    loop {
        let page = fetch(offset, page_size).await?;
        let received = page.len();
        items.extend(page);

        if received < page_size {
            break;
        }
        offset += page_size;
    }

    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::convert::Infallible;

    #[tokio::test]
    async fn stops_on_short_page() {
        let requests = Cell::new(0usize);
        let items: Vec<i32> = fetch_all_pages(2, |offset, limit| {
            requests.set(requests.get() + 1);
            assert_eq!(limit, 2);
            let page = match offset {
                0 => vec![1, 2],
                2 => vec![3, 4],
                4 => vec![5],
                _ => panic!("unexpected offset {offset}"),
            };
            async move { Ok::<_, Infallible>(page) }
        })
        .await
        .unwrap();

        assert_eq!(items, vec![1, 2, 3, 4, 5]);
        assert_eq!(requests.get(), 3);
    }

    #[tokio::test]
    async fn empty_first_page_is_one_request() {
        let requests = Cell::new(0usize);
        let items: Vec<i32> = fetch_all_pages(2, |_offset, _limit| {
            requests.set(requests.get() + 1);
            async move { Ok::<_, Infallible>(Vec::new()) }
        })
        .await
        .unwrap();

        assert!(items.is_empty());
        assert_eq!(requests.get(), 1);
    }

    #[tokio::test]
    async fn exact_multiple_needs_one_extra_request() {
        // Two full pages then an empty one: the walker cannot know the second
        // page was the last until it sees the empty third.
        let requests = Cell::new(0usize);
        let items: Vec<i32> = fetch_all_pages(2, |offset, _limit| {
            requests.set(requests.get() + 1);
            let page = match offset {
                0 => vec![1, 2],
                2 => vec![3, 4],
                _ => Vec::new(),
            };
            async move { Ok::<_, Infallible>(page) }
        })
        .await
        .unwrap();

        assert_eq!(items, vec![1, 2, 3, 4]);
        assert_eq!(requests.get(), 3);
    }

    #[tokio::test]
    async fn errors_propagate_unchanged() {
        let result: Result<Vec<i32>, &str> =
            fetch_all_pages(2, |_offset, _limit| async { Err("boom") }).await;
        assert_eq!(result.unwrap_err(), "boom");
    }
}

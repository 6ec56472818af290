// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Pagination driver for list methods.
//!
//! Turns a list RPC into lazy streams over whole pages or over single
//! elements. The driver re-issues the same request with the previous
//! response's next-page token until the token comes back empty; retry,
//! deadline, cancellation and metadata ride along inside the supplied
//! fetch function. A driver is one-shot: restarting means building a new
//! one from the same initial request.

use async_stream::try_stream;
use futures::future::BoxFuture;
use futures::stream::Stream;
use futures::{StreamExt, pin_mut};
use std::future::Future;

use cortex_types::Result;

/// A list request that can carry a continuation token.
pub trait PageableRequest {
    fn set_page_token(&mut self, token: String);
}

/// A list response: items plus the continuation token. An empty token
/// means there are no more pages.
pub trait PageableResponse {
    type Item;

    fn next_page_token(&self) -> &str;
    fn into_items(self) -> Vec<Self::Item>;
}

type PageFetch<Req, Res> = Box<dyn FnMut(Req) -> BoxFuture<'static, Result<Res>> + Send>;

/// Lazy driver over the pages of one list call.
pub struct Paginator<Req, Res> {
    request: Req,
    fetch: PageFetch<Req, Res>,
}

impl<Req, Res> Paginator<Req, Res>
where
    Req: PageableRequest + Clone + Send + 'static,
    Res: PageableResponse + Send + 'static,
{
    /// Build a driver from the initial request and a page-fetch
    /// function (typically one invoker call per page).
    pub fn new<F, Fut>(request: Req, mut fetch: F) -> Self
    where
        F: FnMut(Req) -> Fut + Send + 'static,
        Fut: Future<Output = Result<Res>> + Send + 'static,
    {
        Self {
            request,
            fetch: Box::new(move |req| Box::pin(fetch(req))),
        }
    }

    /// Stream of whole pages, in server order. A failed fetch ends the
    /// stream with that error; already-yielded pages remain valid.
    pub fn pages(self) -> impl Stream<Item = Result<Res>> + Send {
        let mut request = self.request;
        let mut fetch = self.fetch;
        try_stream! {
            loop {
                let response = fetch(request.clone()).await?;
                let token = response.next_page_token().to_string();
                yield response;

                if token.is_empty() {
                    break;
                }
                request.set_page_token(token);
            }
        }
    }

    /// Stream of single elements across page boundaries.
    pub fn items(self) -> impl Stream<Item = Result<Res::Item>> + Send
    where
        Res::Item: Send,
    {
        let pages = self.pages();
        try_stream! {
            pin_mut!(pages);
            while let Some(page) = pages.next().await {
                let page = page?;
                for item in page.into_items() {
                    yield item;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    use cortex_types::Status;

    #[derive(Debug, Clone, Default)]
    struct ListRequest {
        page_token: String,
    }

    impl PageableRequest for ListRequest {
        fn set_page_token(&mut self, token: String) {
            self.page_token = token;
        }
    }

    #[derive(Debug, Clone)]
    struct ListResponse {
        items: Vec<&'static str>,
        next_page_token: String,
    }

    impl PageableResponse for ListResponse {
        type Item = &'static str;

        fn next_page_token(&self) -> &str {
            &self.next_page_token
        }

        fn into_items(self) -> Vec<&'static str> {
            self.items
        }
    }

    /// Serves the scripted pages ([A, B], "t1"), ([C], "t2"), ([], "").
    fn scripted_fetch(
        calls: Arc<AtomicU32>,
        seen_tokens: Arc<std::sync::Mutex<Vec<String>>>,
    ) -> impl FnMut(ListRequest) -> futures::future::Ready<Result<ListResponse>> + Send + 'static
    {
        move |request: ListRequest| {
            calls.fetch_add(1, Ordering::SeqCst);
            seen_tokens.lock().unwrap().push(request.page_token.clone());
            let response = match request.page_token.as_str() {
                "" => ListResponse {
                    items: vec!["A", "B"],
                    next_page_token: "t1".to_string(),
                },
                "t1" => ListResponse {
                    items: vec!["C"],
                    next_page_token: "t2".to_string(),
                },
                "t2" => ListResponse {
                    items: vec![],
                    next_page_token: String::new(),
                },
                other => panic!("unexpected token {}", other),
            };
            futures::future::ready(Ok(response))
        }
    }

    #[tokio::test]
    async fn test_items_cross_page_boundaries() {
        let calls = Arc::new(AtomicU32::new(0));
        let tokens = Arc::new(std::sync::Mutex::new(Vec::new()));
        let paginator = Paginator::new(
            ListRequest::default(),
            scripted_fetch(calls.clone(), tokens.clone()),
        );

        let items = paginator.items();
        pin_mut!(items);
        let mut collected = Vec::new();
        while let Some(item) = items.next().await {
            collected.push(item.unwrap());
        }

        assert_eq!(collected, vec!["A", "B", "C"]);
        // Exactly three RPCs; the third sees token "t2".
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(*tokens.lock().unwrap(), vec!["", "t1", "t2"]);
    }

    #[tokio::test]
    async fn test_pages_yield_every_page() {
        let calls = Arc::new(AtomicU32::new(0));
        let tokens = Arc::new(std::sync::Mutex::new(Vec::new()));
        let paginator = Paginator::new(
            ListRequest::default(),
            scripted_fetch(calls.clone(), tokens.clone()),
        );

        let pages = paginator.pages();
        pin_mut!(pages);
        let mut sizes = Vec::new();
        while let Some(page) = pages.next().await {
            sizes.push(page.unwrap().into_items().len());
        }

        assert_eq!(sizes, vec![2, 1, 0]);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_fetch_is_lazy() {
        let calls = Arc::new(AtomicU32::new(0));
        let tokens = Arc::new(std::sync::Mutex::new(Vec::new()));
        let paginator = Paginator::new(
            ListRequest::default(),
            scripted_fetch(calls.clone(), tokens.clone()),
        );

        // Building the driver and the stream issues no RPC.
        let items = paginator.items();
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        pin_mut!(items);
        assert_eq!(items.next().await.unwrap().unwrap(), "A");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_error_surfaces_at_failing_step() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_in = calls.clone();
        let paginator = Paginator::new(ListRequest::default(), move |request: ListRequest| {
            calls_in.fetch_add(1, Ordering::SeqCst);
            let result = match request.page_token.as_str() {
                "" => Ok(ListResponse {
                    items: vec!["A"],
                    next_page_token: "t1".to_string(),
                }),
                _ => Err(Status::unavailable("page fetch failed")),
            };
            futures::future::ready(result)
        });

        let items = paginator.items();
        pin_mut!(items);

        // First page's item is valid.
        assert_eq!(items.next().await.unwrap().unwrap(), "A");
        // The second fetch fails; the error surfaces at this step.
        let err = items.next().await.unwrap().unwrap_err();
        assert_eq!(err.code(), cortex_types::Code::Unavailable);
        // The stream is finished afterwards.
        assert!(items.next().await.is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}

//! Pagination: dual paging interfaces, adapters, and the stream paginator

mod adapter;
mod paginator;

pub use adapter::{
    ClientMessageStream, ClientPage, PageItems, StaticPage, StaticPageStream, to_client_page,
    to_client_stream, to_page, to_stream, unwrap_client_page, unwrap_page, unwrap_stream,
};
pub use paginator::{
    DEFAULT_STREAM_EXHAUSTION_GRACE_PERIOD, FirstPageFetcher, FutureStreamFetcher,
    NextPageFetcher, PaginatorFactory, StreamPaginator,
};

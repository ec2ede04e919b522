//! Dual paging interfaces and the two-way adapter between them
//!
//! The remote collaborator exposes pages through domain-specific traits
//! ([`ClientPage`], [`ClientMessageStream`]) that are structurally identical
//! to the generic traits the pagination engine consumes ([`StaticPage`],
//! [`StaticPageStream`]). Rather than making one side depend on the other,
//! thin mappers adapt in both directions, and [`unwrap_page`] recursively
//! strips mapper layers so code that must recognize a specific concrete page
//! type (for instance to read a `next` link the generic contract does not
//! expose) can recover the original instance.

use crate::error::Result;
use serde_json::Value;
use std::any::Any;
use std::sync::Arc;

/// Iterator over the items of one fetched page
///
/// Pages never mutate once fetched, so the items are snapshot into a plain
/// owned sequence.
pub struct PageItems {
    items: std::vec::IntoIter<Value>,
}

impl PageItems {
    /// Build an item iterator from a snapshot of a page's items
    pub fn new(items: Vec<Value>) -> Self {
        Self {
            items: items.into_iter(),
        }
    }
}

impl Iterator for PageItems {
    type Item = Value;

    fn next(&mut self) -> Option<Value> {
        self.items.next()
    }
}

/// Generic view of one finite, ordered batch of items
pub trait StaticPage: Send + Sync + 'static {
    /// Whether a next page is already known and linked
    fn has_next(&self) -> bool;

    /// Iterator over the page's items
    fn item_iterator(&self) -> Result<PageItems>;

    /// Number of items on the page; best-effort, may fail when unknown
    fn item_count(&self) -> Result<i64>;

    /// Type-erased handle for recovering the concrete page type
    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

/// Generic view of a page belonging to a feed that may still grow
pub trait StaticPageStream: StaticPage {
    /// Whether the server may produce more pages later even though none is
    /// known right now. Distinct from `has_next`, which means a next page
    /// is already linked.
    fn has_future(&self) -> bool;
}

/// Domain view of one page of a message collection
///
/// This is the minimal read-only contract of the service's generated
/// collection types.
pub trait ClientPage: Send + Sync + 'static {
    /// Whether a next page is already known and linked
    fn has_next(&self) -> bool;

    /// Iterator over the page's items
    fn item_iterator(&self) -> Result<PageItems>;

    /// Number of items on the page; best-effort, may fail when unknown
    fn item_count(&self) -> Result<i64>;

    /// Type-erased handle for recovering the concrete page type
    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

/// Domain view of one page of a still-growing message feed
pub trait ClientMessageStream: ClientPage {
    /// Whether the feed may still produce more pages
    fn has_future(&self) -> bool;
}

struct PageMapper {
    page: Arc<dyn ClientPage>,
}

impl StaticPage for PageMapper {
    fn has_next(&self) -> bool {
        self.page.has_next()
    }
    fn item_iterator(&self) -> Result<PageItems> {
        self.page.item_iterator()
    }
    fn item_count(&self) -> Result<i64> {
        self.page.item_count()
    }
    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

struct StreamMapper {
    stream: Arc<dyn ClientMessageStream>,
}

impl StaticPage for StreamMapper {
    fn has_next(&self) -> bool {
        self.stream.has_next()
    }
    fn item_iterator(&self) -> Result<PageItems> {
        self.stream.item_iterator()
    }
    fn item_count(&self) -> Result<i64> {
        self.stream.item_count()
    }
    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

impl StaticPageStream for StreamMapper {
    fn has_future(&self) -> bool {
        self.stream.has_future()
    }
}

struct ClientPageMapper {
    page: Arc<dyn StaticPage>,
}

impl ClientPage for ClientPageMapper {
    fn has_next(&self) -> bool {
        self.page.has_next()
    }
    fn item_iterator(&self) -> Result<PageItems> {
        self.page.item_iterator()
    }
    fn item_count(&self) -> Result<i64> {
        self.page.item_count()
    }
    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

struct ClientStreamMapper {
    stream: Arc<dyn StaticPageStream>,
}

impl ClientPage for ClientStreamMapper {
    fn has_next(&self) -> bool {
        self.stream.has_next()
    }
    fn item_iterator(&self) -> Result<PageItems> {
        self.stream.item_iterator()
    }
    fn item_count(&self) -> Result<i64> {
        self.stream.item_count()
    }
    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

impl ClientMessageStream for ClientStreamMapper {
    fn has_future(&self) -> bool {
        self.stream.has_future()
    }
}

/// Adapt a domain page to the generic contract; `None` maps to `None`
pub fn to_page(page: Option<Arc<dyn ClientPage>>) -> Option<Arc<dyn StaticPage>> {
    page.map(|page| Arc::new(PageMapper { page }) as Arc<dyn StaticPage>)
}

/// Adapt a domain stream to the generic contract; `None` maps to `None`
pub fn to_stream(
    stream: Option<Arc<dyn ClientMessageStream>>,
) -> Option<Arc<dyn StaticPageStream>> {
    stream.map(|stream| Arc::new(StreamMapper { stream }) as Arc<dyn StaticPageStream>)
}

/// Adapt a generic page to the domain contract; `None` maps to `None`
pub fn to_client_page(page: Option<Arc<dyn StaticPage>>) -> Option<Arc<dyn ClientPage>> {
    page.map(|page| Arc::new(ClientPageMapper { page }) as Arc<dyn ClientPage>)
}

/// Adapt a generic stream to the domain contract; `None` maps to `None`
pub fn to_client_stream(
    stream: Option<Arc<dyn StaticPageStream>>,
) -> Option<Arc<dyn ClientMessageStream>> {
    stream.map(|stream| Arc::new(ClientStreamMapper { stream }) as Arc<dyn ClientMessageStream>)
}

/// Recursively strip adapter layers from a type-erased page handle
fn strip_mappers(handle: Arc<dyn Any + Send + Sync>) -> Arc<dyn Any + Send + Sync> {
    let mut current = handle;
    loop {
        if let Some(mapper) = current.downcast_ref::<PageMapper>() {
            current = mapper.page.clone().as_any();
            continue;
        }
        if let Some(mapper) = current.downcast_ref::<StreamMapper>() {
            current = mapper.stream.clone().as_any();
            continue;
        }
        if let Some(mapper) = current.downcast_ref::<ClientPageMapper>() {
            current = mapper.page.clone().as_any();
            continue;
        }
        if let Some(mapper) = current.downcast_ref::<ClientStreamMapper>() {
            current = mapper.stream.clone().as_any();
            continue;
        }
        return current;
    }
}

/// Recover the original concrete instance behind any number of adapter layers
///
/// The returned handle can be downcast to the concrete page type with
/// [`Arc::downcast`]. A page that was never adapted unwraps to itself.
pub fn unwrap_page(page: Arc<dyn StaticPage>) -> Arc<dyn Any + Send + Sync> {
    strip_mappers(page.as_any())
}

/// Stream counterpart of [`unwrap_page`]
pub fn unwrap_stream(stream: Arc<dyn StaticPageStream>) -> Arc<dyn Any + Send + Sync> {
    strip_mappers(stream.as_any())
}

/// Recover the original concrete instance behind a domain-page handle
pub fn unwrap_client_page(page: Arc<dyn ClientPage>) -> Arc<dyn Any + Send + Sync> {
    strip_mappers(page.as_any())
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct FakeFeedPage {
        items: Vec<Value>,
        next: bool,
        future: bool,
    }

    impl ClientPage for FakeFeedPage {
        fn has_next(&self) -> bool {
            self.next
        }
        fn item_iterator(&self) -> Result<PageItems> {
            Ok(PageItems::new(self.items.clone()))
        }
        fn item_count(&self) -> Result<i64> {
            Ok(self.items.len() as i64)
        }
        fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
            self
        }
    }

    impl ClientMessageStream for FakeFeedPage {
        fn has_future(&self) -> bool {
            self.future
        }
    }

    fn fake_stream() -> Arc<dyn ClientMessageStream> {
        Arc::new(FakeFeedPage {
            items: vec![json!({"message": "a"}), json!({"message": "b"})],
            next: true,
            future: false,
        })
    }

    #[test]
    fn test_adapting_none_yields_none() {
        assert!(to_page(None).is_none());
        assert!(to_stream(None).is_none());
        assert!(to_client_page(None).is_none());
        assert!(to_client_stream(None).is_none());
    }

    #[test]
    fn test_adapter_preserves_observable_behavior() {
        let original = fake_stream();
        let adapted = to_stream(Some(original.clone())).unwrap();

        assert_eq!(adapted.has_next(), original.has_next());
        assert_eq!(adapted.has_future(), original.has_future());
        assert_eq!(
            adapted.item_count().unwrap(),
            original.item_count().unwrap()
        );
        let adapted_items: Vec<Value> = adapted.item_iterator().unwrap().collect();
        let original_items: Vec<Value> = original.item_iterator().unwrap().collect();
        assert_eq!(adapted_items, original_items);
    }

    #[test]
    fn test_round_trip_law_holds_over_repeated_cycles() {
        let original = fake_stream();
        let original_items: Vec<Value> = original.item_iterator().unwrap().collect();

        // adapt -> adapt back -> adapt, several cycles deep
        let mut generic = to_stream(Some(original.clone())).unwrap();
        for _ in 0..3 {
            let domain = to_client_stream(Some(generic)).unwrap();
            generic = to_stream(Some(domain)).unwrap();
        }

        assert_eq!(generic.has_next(), original.has_next());
        assert_eq!(generic.has_future(), original.has_future());
        assert_eq!(
            generic.item_count().unwrap(),
            original.item_count().unwrap()
        );
        let items: Vec<Value> = generic.item_iterator().unwrap().collect();
        assert_eq!(items, original_items);

        let unwrapped = unwrap_stream(generic);
        let concrete = unwrapped.downcast::<FakeFeedPage>().unwrap();
        assert!(concrete.next);
        assert_eq!(concrete.items.len(), 2);
    }

    #[test]
    fn test_unwrap_of_unadapted_page_is_identity() {
        let page: Arc<dyn ClientPage> = fake_stream();
        let unwrapped = unwrap_client_page(page);
        assert!(unwrapped.downcast::<FakeFeedPage>().is_ok());
    }
}

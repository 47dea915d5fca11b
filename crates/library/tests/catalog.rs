//! End-to-end behaviour of linking, resolution and fetch coordination over
//! in-memory sites, storage and database.

use catalog_config::FetchConfig;
use catalog_library::fetch::error::ErrorKind as FetchErrorKind;
use catalog_library::link::error::ErrorKind as LinkErrorKind;
use catalog_library::{Caller, Context, FetchCoordinator, FetchOutcome, JobStatus, get_by_url};
use catalog_sites::error::{DownloadErrorKind, ErrorKind as SiteErrorKind};
use catalog_sites::mock::MockSite;
use catalog_sites::models::{IdType, ItemModel, ResourceContent, ResourceDescriptor};
use catalog_sites::{AdapterHandle, NoRedirects, SiteRegistry};
use catalog_storage::CoverStore;
use catalog_storage::backend::MockBackend;
use catalog_store::error::ErrorKind as StoreErrorKind;
use catalog_store::item::ItemKind;
use catalog_store::{Database, ItemRef, Repository, Resolution};
use std::sync::Arc;
use std::time::Duration;

const ISBN: &str = "9780553283686";

fn url(site: &str, id: &str) -> String {
    format!("https://{site}.example/item/{id}")
}

fn books() -> MockSite {
    MockSite::new("books", IdType::Goodreads, ItemModel::Edition)
}

async fn context(sites: Vec<Arc<MockSite>>) -> Context {
    let adapters = sites.into_iter().map(|site| site as AdapterHandle);
    let registry = SiteRegistry::from_adapters(adapters, Arc::new(NoRedirects)).unwrap();
    let db = Database::connect_in_memory().await.unwrap();
    Context::new(Arc::new(registry), Repository::from(&db))
}

async fn coordinator(sites: Vec<Arc<MockSite>>) -> FetchCoordinator {
    FetchCoordinator::new(context(sites).await, FetchConfig::default())
}

#[tokio::test]
async fn test_relinking_is_idempotent() {
    let site = Arc::new(books().with_content("1", ResourceContent::titled("Hyperion")));
    let fetch = coordinator(vec![site.clone()]).await;

    let first = fetch.fetch_now(&url("books", "1"), false).await.unwrap();
    let second = fetch.fetch_now(&url("books", "1"), false).await.unwrap();
    assert!(first.created);
    assert!(!second.created);
    assert_eq!(first.item.uuid, second.item.uuid);
    assert_eq!(site.scrape_count(), 1);
    let resources = fetch.context().repository.list_resources(first.item.uuid).await.unwrap();
    assert_eq!(resources.len(), 1);
}

#[tokio::test]
async fn test_sites_sharing_an_isbn_converge() {
    let a = Arc::new(books().with_content("1", ResourceContent::titled("T").with_lookup_id(IdType::Isbn, ISBN)));
    let b = Arc::new(MockSite::new("shelf", IdType::GoogleBooks, ItemModel::Edition).with_content(
        "x1",
        ResourceContent::titled("T2").with_lookup_id(IdType::Isbn, ISBN).with_metadata("pages", 482),
    ));
    let fetch = coordinator(vec![a, b]).await;

    let e1 = fetch.fetch_now(&url("books", "1"), false).await.unwrap();
    assert!(e1.created);
    assert_eq!(e1.item.get_primary_id(), Some((IdType::Isbn, ISBN)));

    let e2 = fetch.fetch_now(&url("shelf", "x1"), false).await.unwrap();
    assert!(!e2.created);
    assert_eq!(e2.item.uuid, e1.item.uuid);
    assert_eq!(e2.item.title(), "T");
    let ItemKind::Edition(edition) = &e2.item.kind else { panic!("wrong variant") };
    assert_eq!(edition.pages, Some(482));
}

#[tokio::test]
async fn test_forced_refetch_overwrites_fields() {
    let site = Arc::new(books().with_content("1", ResourceContent::titled("Old title")));
    let fetch = coordinator(vec![site.clone()]).await;
    let first = fetch.fetch_now(&url("books", "1"), false).await.unwrap();

    site.set_content("1", ResourceContent::titled("New title"));
    let job = fetch.enqueue_fetch(&url("books", "1"), true).await.unwrap();
    assert_eq!(fetch.wait(job).await.unwrap(), JobStatus::Finished(first.item.uuid));
    let item = fetch.context().repository.get_item(first.item.uuid).await.unwrap().unwrap();
    assert_eq!(item.title(), "New title");
    assert_eq!(site.scrape_count(), 2);
}

#[tokio::test]
async fn test_merge_chains_resolve_to_the_end() {
    let site = Arc::new(
        books()
            .with_content("a", ResourceContent::titled("A"))
            .with_content("b", ResourceContent::titled("B"))
            .with_content("c", ResourceContent::titled("C")),
    );
    let fetch = coordinator(vec![site]).await;
    let a = fetch.fetch_now(&url("books", "a"), false).await.unwrap().item;
    let b = fetch.fetch_now(&url("books", "b"), false).await.unwrap().item;
    let c = fetch.fetch_now(&url("books", "c"), false).await.unwrap().item;
    let ctx = fetch.context();

    ctx.repository.merge_to(a.uuid, Some(b.uuid)).await.unwrap();
    ctx.repository.merge_to(b.uuid, Some(c.uuid)).await.unwrap();

    let resolved = get_by_url(ctx, &url("books", "a"), true).await.unwrap().into_live().unwrap();
    assert_eq!(resolved.uuid, c.uuid);
    let resolution = ctx.repository.resolve(&ItemRef::Uuid(a.uuid), true).await.unwrap();
    let Resolution::Redirect { from, to } = resolution else { panic!("expected a redirect") };
    assert_eq!((from.uuid, to.uuid), (a.uuid, c.uuid));
    // Linking the merged resource again lands on the end of the chain.
    let again = fetch.fetch_now(&url("books", "a"), false).await.unwrap();
    assert_eq!(again.item.uuid, c.uuid);
}

#[tokio::test]
async fn test_deleted_item_is_not_a_merge_target() {
    let site = Arc::new(
        books()
            .with_content("a", ResourceContent::titled("A"))
            .with_content("b", ResourceContent::titled("B")),
    );
    let fetch = coordinator(vec![site]).await;
    let a = fetch.fetch_now(&url("books", "a"), false).await.unwrap().item;
    let b = fetch.fetch_now(&url("books", "b"), false).await.unwrap().item;
    let repo = &fetch.context().repository;

    repo.merge_to(a.uuid, Some(b.uuid)).await.unwrap();
    repo.delete(b.uuid).await.unwrap();
    let err = repo.merge_to(a.uuid, Some(b.uuid)).await.unwrap_err();
    assert!(matches!(&*err, StoreErrorKind::MergeRejected(_)));
    assert!(matches!(repo.resolve(&ItemRef::Uuid(a.uuid), true).await.unwrap(), Resolution::Deleted(_)));
}

#[tokio::test]
async fn test_soft_deleted_item_is_distinguishable() {
    let site = Arc::new(books().with_content("1", ResourceContent::titled("Hyperion")));
    let fetch = coordinator(vec![site]).await;
    let item = fetch.fetch_now(&url("books", "1"), false).await.unwrap().item;
    let repo = &fetch.context().repository;

    repo.delete(item.uuid).await.unwrap();
    let resolution = repo.resolve(&ItemRef::Uuid(item.uuid), true).await.unwrap();
    assert!(matches!(&resolution, Resolution::Deleted(deleted) if deleted.uuid == item.uuid));
    assert_eq!(resolution.into_live(), None);
    let never = repo.resolve(&ItemRef::Uuid(uuid::Uuid::new_v4()), true).await.unwrap();
    assert_eq!(never, Resolution::NotFound);
}

#[tokio::test]
async fn test_required_work_is_linked_first() {
    let work = ResourceDescriptor::new(IdType::GoodreadsWork, "w1").with_model(ItemModel::Work);
    let books = Arc::new(books().with_content("1", ResourceContent::titled("Hyperion").with_required(work)));
    let works = Arc::new(
        MockSite::new("works", IdType::GoodreadsWork, ItemModel::Work)
            .with_content("w1", ResourceContent::titled("Hyperion Cantos")),
    );
    let fetch = coordinator(vec![books, works.clone()]).await;

    let edition = fetch.fetch_now(&url("books", "1"), false).await.unwrap().item;
    let reference = ItemRef::Resource { id_type: IdType::GoodreadsWork, id_value: "w1".to_string() };
    let work = fetch.context().repository.resolve(&reference, true).await.unwrap().into_live().unwrap();
    assert_eq!(work.model(), ItemModel::Work);
    assert_eq!(edition.parent, Some(work.uuid));
    assert_eq!(works.scrape_count(), 1);
}

#[tokio::test]
async fn test_preloaded_required_content_is_not_scraped() {
    let work = ResourceDescriptor::new(IdType::GoodreadsWork, "w1")
        .with_model(ItemModel::Work)
        .with_content(ResourceContent::titled("Hyperion Cantos"));
    let books = Arc::new(books().with_content("1", ResourceContent::titled("Hyperion").with_required(work)));
    let works = Arc::new(MockSite::new("works", IdType::GoodreadsWork, ItemModel::Work));
    let fetch = coordinator(vec![books, works.clone()]).await;

    let edition = fetch.fetch_now(&url("books", "1"), false).await.unwrap().item;
    assert!(edition.parent.is_some());
    assert_eq!(works.scrape_count(), 0);
}

#[tokio::test]
async fn test_failed_required_resource_fails_the_link() {
    let work = ResourceDescriptor::new(IdType::GoodreadsWork, "w1").with_model(ItemModel::Work);
    let books = Arc::new(books().with_content("1", ResourceContent::titled("Hyperion").with_required(work)));
    let works = Arc::new(MockSite::new("works", IdType::GoodreadsWork, ItemModel::Work).with_failure(
        "w1",
        SiteErrorKind::Download(DownloadErrorKind::Network, "connection reset".to_string()),
    ));
    let fetch = coordinator(vec![books, works]).await;

    let err = fetch.fetch_now(&url("books", "1"), false).await.unwrap_err();
    assert!(matches!(&*err, FetchErrorKind::Link(LinkErrorKind::RequiredResource { id_type: IdType::GoodreadsWork, .. })));
    // The edition is never stored without its work.
    let stored = fetch.context().repository.get_resource(IdType::Goodreads, "1").await.unwrap();
    assert_eq!(stored, None);
}

#[tokio::test]
async fn test_required_resource_cycle_is_rejected() {
    let site = Arc::new(
        books()
            .with_content(
                "a",
                ResourceContent::titled("A").with_required(ResourceDescriptor::new(IdType::Goodreads, "b")),
            )
            .with_content(
                "b",
                ResourceContent::titled("B").with_required(ResourceDescriptor::new(IdType::Goodreads, "a")),
            ),
    );
    let fetch = coordinator(vec![site]).await;

    let err = fetch.fetch_now(&url("books", "a"), false).await.unwrap_err();
    assert!(matches!(
        &*err,
        FetchErrorKind::Link(LinkErrorKind::DependencyCycle { id_type: IdType::Goodreads, id_value }) if id_value == "a"
    ));
    let repo = &fetch.context().repository;
    assert_eq!(repo.get_resource(IdType::Goodreads, "a").await.unwrap(), None);
    assert_eq!(repo.get_resource(IdType::Goodreads, "b").await.unwrap(), None);
}

#[tokio::test]
async fn test_covers_are_stored_once() {
    let backend = Arc::new(MockBackend::default());
    let a = Arc::new(books().with_content("1", ResourceContent::titled("T").with_cover(b"jpeg".to_vec(), "jpg")));
    let b = Arc::new(
        MockSite::new("shelf", IdType::GoogleBooks, ItemModel::Edition)
            .with_content("x1", ResourceContent::titled("T").with_cover(b"jpeg".to_vec(), "jpg")),
    );
    let ctx = context(vec![a, b]).await.with_covers(CoverStore::new(backend.clone()));
    let fetch = FetchCoordinator::new(ctx, FetchConfig::default());

    let first = fetch.fetch_now(&url("books", "1"), false).await.unwrap().item;
    let cover = first.cover.clone().unwrap();
    assert!(cover.starts_with("covers/"));
    let second = fetch.fetch_now(&url("shelf", "x1"), false).await.unwrap();
    assert_eq!(backend.write_count(), 1);
    let resource = fetch.context().repository.get_resource(IdType::GoogleBooks, "x1").await.unwrap().unwrap();
    assert_eq!(resource.cover.as_deref(), Some(cover.as_str()));
    assert_ne!(second.item.uuid, first.uuid);
}

#[tokio::test]
async fn test_rapid_enqueues_share_one_job() {
    let site = Arc::new(
        books()
            .with_content("1", ResourceContent::titled("Hyperion"))
            .with_delay(Duration::from_millis(200)),
    );
    let fetch = coordinator(vec![site.clone()]).await;

    let first = fetch.enqueue_fetch(&url("books", "1"), false).await.unwrap();
    let second = fetch.enqueue_fetch(&url("books", "1"), false).await.unwrap();
    assert_eq!(first, second);
    let JobStatus::Finished(uuid) = fetch.wait(first).await.unwrap() else { panic!("job failed") };
    assert_eq!(site.scrape_count(), 1);
    assert_eq!(fetch.url(first).unwrap(), url("books", "1"));

    // Once finished, the key is free again; the new job is served from the catalog.
    let third = fetch.enqueue_fetch(&url("books", "1"), false).await.unwrap();
    assert_ne!(third, first);
    assert_eq!(fetch.wait(third).await.unwrap(), JobStatus::Finished(uuid));
    assert_eq!(site.scrape_count(), 1);
}

#[tokio::test]
async fn test_request_lifecycle() {
    let site = Arc::new(
        books()
            .with_content("1", ResourceContent::titled("Hyperion"))
            .with_delay(Duration::from_millis(100)),
    );
    let fetch = coordinator(vec![site]).await;
    let anonymous = Caller::Anonymous;
    let user = Caller::User("42".to_string());

    let outcome = fetch.request(&anonymous, "https://nowhere.example/item/1").await.unwrap();
    assert_eq!(outcome, FetchOutcome::Unsupported);

    let FetchOutcome::InProgress(job) = fetch.request(&anonymous, &url("books", "1")).await.unwrap() else {
        panic!("expected the first request to start a job");
    };
    // Throttled, but the running job is handed out.
    assert_eq!(fetch.request(&user, &url("books", "1")).await.unwrap(), FetchOutcome::InProgress(job));

    let JobStatus::Finished(uuid) = fetch.wait(job).await.unwrap() else { panic!("job failed") };
    let FetchOutcome::Ready(item) = fetch.request(&anonymous, &url("books", "1")).await.unwrap() else {
        panic!("expected the item to be ready");
    };
    assert_eq!(item.uuid, uuid);
}

#[tokio::test]
async fn test_failed_fetch_is_not_retried() {
    let site = Arc::new(books().with_failure(
        "1",
        SiteErrorKind::Download(DownloadErrorKind::Censorship, "blocked".to_string()),
    ));
    let fetch = coordinator(vec![site.clone()]).await;

    let FetchOutcome::InProgress(job) = fetch.request(&Caller::User("1".to_string()), &url("books", "1")).await.unwrap()
    else {
        panic!("expected a job");
    };
    assert!(matches!(fetch.wait(job).await.unwrap(), JobStatus::Failed(_)));
    assert_eq!(site.scrape_count(), 1);

    // The URL window is still closed and nothing is running: not found.
    let outcome = fetch.request(&Caller::User("2".to_string()), &url("books", "1")).await.unwrap();
    assert_eq!(outcome, FetchOutcome::NotFound);
    assert_eq!(site.scrape_count(), 1);
}

#[tokio::test]
async fn test_throttled_caller_still_gets_a_job_for_a_new_url() {
    let site = Arc::new(
        books()
            .with_content("1", ResourceContent::titled("Hyperion"))
            .with_content("2", ResourceContent::titled("The Fall of Hyperion")),
    );
    let fetch = coordinator(vec![site.clone()]).await;

    // Anonymous callers share one window, so the second request is throttled.
    let FetchOutcome::InProgress(first) = fetch.request(&Caller::Anonymous, &url("books", "1")).await.unwrap() else {
        panic!("expected a job for the first url");
    };
    let FetchOutcome::InProgress(second) = fetch.request(&Caller::Anonymous, &url("books", "2")).await.unwrap() else {
        panic!("expected a job for a url nobody has tried");
    };
    assert_ne!(first, second);
    assert!(matches!(fetch.wait(first).await.unwrap(), JobStatus::Finished(_)));
    assert!(matches!(fetch.wait(second).await.unwrap(), JobStatus::Finished(_)));
    assert_eq!(site.scrape_count_for("2"), 1);
}

#[tokio::test]
async fn test_finished_jobs_are_forgotten_oldest_first() {
    let site = Arc::new(
        books()
            .with_content("1", ResourceContent::titled("Hyperion"))
            .with_content("2", ResourceContent::titled("The Fall of Hyperion")),
    );
    let config = FetchConfig { job_history: 1, ..FetchConfig::default() };
    let fetch = FetchCoordinator::new(context(vec![site]).await, config);

    let first = fetch.enqueue_fetch(&url("books", "1"), false).await.unwrap();
    assert!(matches!(fetch.wait(first).await.unwrap(), JobStatus::Finished(_)));
    assert!(matches!(fetch.status(first).unwrap(), JobStatus::Finished(_)));

    let second = fetch.enqueue_fetch(&url("books", "2"), false).await.unwrap();
    assert!(matches!(fetch.wait(second).await.unwrap(), JobStatus::Finished(_)));
    assert!(matches!(fetch.status(second).unwrap(), JobStatus::Finished(_)));
    let err = fetch.status(first).unwrap_err();
    assert!(matches!(&*err, FetchErrorKind::UnknownJob(id) if *id == first));
    assert!(fetch.wait(first).await.is_err());
}

#[tokio::test]
async fn test_related_resources_become_separate_jobs() {
    let related = ResourceDescriptor::new(IdType::Goodreads, "2").with_title("Fall of Hyperion");
    let site = Arc::new(
        books()
            .with_content("1", ResourceContent::titled("Hyperion").with_related(related))
            .with_content("2", ResourceContent::titled("The Fall of Hyperion")),
    );
    let fetch = coordinator(vec![site.clone()]).await;

    let job = fetch.enqueue_fetch(&url("books", "1"), false).await.unwrap();
    assert!(matches!(fetch.wait(job).await.unwrap(), JobStatus::Finished(_)));

    let mut linked = None;
    for _ in 0..100 {
        linked = get_by_url(fetch.context(), &url("books", "2"), true).await.unwrap().into_live();
        if linked.is_some() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(linked.unwrap().title(), "The Fall of Hyperion");
    assert_eq!(site.scrape_count_for("2"), 1);
}

#[tokio::test]
async fn test_related_failures_do_not_fail_the_job() {
    let related = ResourceDescriptor::new(IdType::Goodreads, "missing");
    let site = Arc::new(books().with_content("1", ResourceContent::titled("Hyperion").with_related(related)));
    let fetch = coordinator(vec![site]).await;

    let job = fetch.enqueue_fetch(&url("books", "1"), false).await.unwrap();
    assert!(matches!(fetch.wait(job).await.unwrap(), JobStatus::Finished(_)));
}

#[tokio::test]
async fn test_unsupported_url() {
    let fetch = coordinator(Vec::new()).await;
    let err = fetch.enqueue_fetch("https://books.example/item/1", false).await.unwrap_err();
    assert!(matches!(&*err, FetchErrorKind::UnsupportedUrl(_)));
}

//! Behavioural checks every `RouterRepository` backend must pass.
//!
//! Each check works on its own tenants, so a single repository instance can
//! run the whole suite. Backends call [`run_all`] from their own tests.

use crate::repository::RouterRepository;
use crate::router::{
    AddRoutersInput, DeleteRoutersInput, GetRouterInput, GetRouterPageInput, PageRequest, Router,
};

/// Router with every descriptive field populated
pub fn sample_router(serial: &str) -> Router {
    Router {
        serial: serial.to_string(),
        router_id: format!("id-{serial}"),
        operator_name: "Orange".to_string(),
        country_code: "FR".to_string(),
        mac: "00:1B:44:11:3A:B7".to_string(),
        model: "RX-300".to_string(),
        account_id: "acct-42".to_string(),
        agent_last_connection: "2023-06-17T10:00:00Z".to_string(),
        agent_version: "1.4.2".to_string(),
    }
}

pub async fn run_all(repo: &dyn RouterRepository) {
    tenant_isolation(repo).await;
    insert_keeps_first_writer(repo).await;
    duplicate_serial_within_batch(repo).await;
    delete_absent_is_noop(repo).await;
    round_trip_preserves_fields(repo).await;
    paging_arithmetic(repo).await;
    page_beyond_data(repo).await;
    paging_is_deterministic(repo).await;
    empty_tenant_page(repo).await;
}

async fn add(repo: &dyn RouterRepository, tenant: &str, routers: Vec<Router>) -> Vec<Router> {
    repo.add_routers(AddRoutersInput {
        tenant: tenant.to_string(),
        routers,
    })
    .await
    .expect("add_routers failed")
}

async fn get(repo: &dyn RouterRepository, tenant: &str, serial: &str) -> Option<Router> {
    repo.get_router(GetRouterInput {
        tenant: tenant.to_string(),
        serial: serial.to_string(),
    })
    .await
    .expect("get_router failed")
}

async fn page(
    repo: &dyn RouterRepository,
    tenant: &str,
    limit: usize,
    page: usize,
) -> (Vec<String>, i64) {
    let result = repo
        .get_router_page(GetRouterPageInput {
            tenant: tenant.to_string(),
            page: PageRequest {
                limit,
                page,
                sort: String::new(),
            },
        })
        .await
        .expect("get_router_page failed");

    let serials = result.routers.into_iter().map(|r| r.serial).collect();
    (serials, result.last_page_index)
}

pub async fn tenant_isolation(repo: &dyn RouterRepository) {
    add(repo, "isolation-a", vec![sample_router("SN-ISO")]).await;

    assert!(get(repo, "isolation-b", "SN-ISO").await.is_none());

    // Same serial is free in another tenant and deleting there leaves the first intact
    let rejected = add(repo, "isolation-b", vec![sample_router("SN-ISO")]).await;
    assert!(rejected.is_empty());

    repo.delete_routers(DeleteRoutersInput {
        tenant: "isolation-b".to_string(),
        serials: vec!["SN-ISO".to_string()],
    })
    .await
    .expect("delete_routers failed");

    assert!(get(repo, "isolation-a", "SN-ISO").await.is_some());
    let (serials, _) = page(repo, "isolation-b", 10, 0).await;
    assert!(serials.is_empty());
}

pub async fn insert_keeps_first_writer(repo: &dyn RouterRepository) {
    let original = sample_router("SN-DUP");
    let mut replacement = sample_router("SN-DUP");
    replacement.operator_name = "Vodafone".to_string();

    assert!(add(repo, "first-writer", vec![original.clone()]).await.is_empty());

    let rejected = add(repo, "first-writer", vec![replacement.clone()]).await;
    assert_eq!(rejected, vec![replacement]);

    assert_eq!(get(repo, "first-writer", "SN-DUP").await, Some(original));
    let (serials, last) = page(repo, "first-writer", 10, 0).await;
    assert_eq!(serials, vec!["SN-DUP".to_string()]);
    assert_eq!(last, 0);
}

pub async fn duplicate_serial_within_batch(repo: &dyn RouterRepository) {
    let first = sample_router("SN-BATCH");
    let mut second = sample_router("SN-BATCH");
    second.model = "RX-500".to_string();

    let rejected = add(
        repo,
        "batch-dup",
        vec![first.clone(), sample_router("SN-OTHER"), second.clone()],
    )
    .await;

    assert_eq!(rejected, vec![second]);
    assert_eq!(get(repo, "batch-dup", "SN-BATCH").await, Some(first));
}

pub async fn delete_absent_is_noop(repo: &dyn RouterRepository) {
    add(repo, "delete-noop", vec![sample_router("SN-KEEP")]).await;

    repo.delete_routers(DeleteRoutersInput {
        tenant: "delete-noop".to_string(),
        serials: vec!["SN-MISSING".to_string()],
    })
    .await
    .expect("deleting an absent router must not fail");

    repo.delete_routers(DeleteRoutersInput {
        tenant: "delete-noop-unknown-tenant".to_string(),
        serials: vec!["SN-KEEP".to_string()],
    })
    .await
    .expect("deleting in an unknown tenant must not fail");

    assert!(get(repo, "delete-noop", "SN-KEEP").await.is_some());
}

pub async fn round_trip_preserves_fields(repo: &dyn RouterRepository) {
    let router = sample_router("SN-ROUND");

    assert!(add(repo, "round-trip", vec![router.clone()]).await.is_empty());
    assert_eq!(get(repo, "round-trip", "SN-ROUND").await, Some(router));

    repo.delete_routers(DeleteRoutersInput {
        tenant: "round-trip".to_string(),
        serials: vec!["SN-ROUND".to_string()],
    })
    .await
    .expect("delete_routers failed");

    assert!(get(repo, "round-trip", "SN-ROUND").await.is_none());
}

pub async fn paging_arithmetic(repo: &dyn RouterRepository) {
    // Inserted in descending order so the backend must sort, not replay insertion order
    let routers = (0..25)
        .rev()
        .map(|i| sample_router(&format!("SN-{i:02}")))
        .collect();
    add(repo, "paging", routers).await;

    let expected: Vec<String> = (0..25).map(|i| format!("SN-{i:02}")).collect();

    let (page0, last0) = page(repo, "paging", 10, 0).await;
    let (page1, last1) = page(repo, "paging", 10, 1).await;
    let (page2, last2) = page(repo, "paging", 10, 2).await;

    assert_eq!(page0, expected[0..10]);
    assert_eq!(page1, expected[10..20]);
    assert_eq!(page2, expected[20..25]);
    assert_eq!((last0, last1, last2), (2, 2, 2));
}

pub async fn page_beyond_data(repo: &dyn RouterRepository) {
    let routers = (0..5).map(|i| sample_router(&format!("SN-{i}"))).collect();
    add(repo, "out-of-range", routers).await;

    let (serials, last) = page(repo, "out-of-range", 10, 3).await;
    assert!(serials.is_empty());
    assert_eq!(last, 0);
}

pub async fn paging_is_deterministic(repo: &dyn RouterRepository) {
    let routers = ["SN-C", "SN-A", "SN-E", "SN-B", "SN-D"]
        .iter()
        .map(|serial| sample_router(serial))
        .collect();
    add(repo, "deterministic", routers).await;

    let first = page(repo, "deterministic", 2, 1).await;
    let second = page(repo, "deterministic", 2, 1).await;

    assert_eq!(first, second);
    assert_eq!(first.0, vec!["SN-C".to_string(), "SN-D".to_string()]);
}

pub async fn empty_tenant_page(repo: &dyn RouterRepository) {
    let (serials, last) = page(repo, "never-written", 10, 0).await;
    assert!(serials.is_empty());
    assert_eq!(last, -1);
}

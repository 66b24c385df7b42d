//! Deal listing and search tests.

use bitrix24_deals::{DealFields, DealFilter, DealOrder, DealsClient, ListParams, MAX_PAGE_SIZE};
use bitrix24_tests::{create_test_client, spawn_mock, unique_title};
use rust_decimal_macros::dec;
use serde_json::json;

async fn seed(client: &DealsClient, fields: DealFields) -> String {
    client
        .create_deal(fields)
        .await
        .expect("Failed to create deal")
        .id
        .expect("Created deal has no id")
}

#[tokio::test]
async fn test_list_limit_is_clamped() {
    let server = spawn_mock().await;
    let client = create_test_client(&server).expect("Failed to create client");
    for i in 0..60 {
        seed(&client, DealFields::new().title(format!("Bulk {}", i))).await;
    }

    let page = client
        .list_deals_page(&ListParams::new().limit(200))
        .await
        .expect("Failed to list deals");

    assert_eq!(page.deals.len(), MAX_PAGE_SIZE as usize);
    assert_eq!(page.total, Some(60));
    assert_eq!(page.next, Some(50));
    assert!(page.has_more());

    let calls = server.state.calls_for("crm.deal.list");
    assert_eq!(calls[0].payload["limit"], json!(50));
    assert_eq!(calls[0].payload["start"], json!(0));
}

#[tokio::test]
async fn test_list_second_page() {
    let server = spawn_mock().await;
    let client = create_test_client(&server).expect("Failed to create client");
    for i in 0..55 {
        seed(&client, DealFields::new().title(format!("Page {}", i))).await;
    }

    let page = client
        .list_deals_page(&ListParams::new().start(50))
        .await
        .expect("Failed to list deals");

    assert_eq!(page.deals.len(), 5);
    assert!(!page.has_more());
}

#[tokio::test]
async fn test_list_with_filter_select_and_order() {
    let server = spawn_mock().await;
    let client = create_test_client(&server).expect("Failed to create client");
    seed(&client, DealFields::new().title("Small").amount(dec!(100))).await;
    seed(&client, DealFields::new().title("Large").amount(dec!(9000))).await;
    seed(&client, DealFields::new().title("Medium").amount(dec!(500))).await;

    let params = ListParams::new()
        .filter(DealFilter::new().gte("OPPORTUNITY", 500))
        .select(["ID", "TITLE", "OPPORTUNITY"])
        .order(DealOrder::new().asc("OPPORTUNITY"));
    let deals = client.list_deals(&params).await.expect("Failed to list deals");

    let titles: Vec<_> = deals.iter().map(|d| d.title.as_str()).collect();
    assert_eq!(titles, vec!["Medium", "Large"]);
    assert!(deals[0].date_create.is_none());

    let calls = server.state.calls_for("crm.deal.list");
    assert_eq!(
        calls[0].payload,
        json!({
            "start": 0,
            "limit": 50,
            "filter": {">=OPPORTUNITY": 500},
            "select": ["ID", "TITLE", "OPPORTUNITY"],
            "order": {"OPPORTUNITY": "ASC"}
        })
    );
}

#[tokio::test]
async fn test_search_deals() {
    let server = spawn_mock().await;
    let client = create_test_client(&server).expect("Failed to create client");
    let marker = unique_title("needle");
    seed(&client, DealFields::new().title(format!("Deal {}", marker))).await;
    seed(&client, DealFields::new().title("Unrelated")).await;

    let found = client
        .search_deals(&marker, None)
        .await
        .expect("Failed to search deals");

    assert_eq!(found.len(), 1);
    assert!(found[0].title.contains(&marker));

    let calls = server.state.calls_for("crm.deal.list");
    assert_eq!(calls[0].payload["filter"], json!({"%TITLE": marker}));
    assert_eq!(calls[0].payload["order"], json!({"DATE_MODIFY": "DESC"}));
    assert_eq!(calls[0].payload["limit"], json!(20));
}

#[tokio::test]
async fn test_deals_by_stage_contact_and_company() {
    let server = spawn_mock().await;
    let client = create_test_client(&server).expect("Failed to create client");
    seed(&client, DealFields::new().title("A").stage("EXECUTING").contact(7).company(3)).await;
    seed(&client, DealFields::new().title("B").contact(8).company(3)).await;

    let executing = client
        .deals_by_stage("EXECUTING", None)
        .await
        .expect("Failed to list by stage");
    assert_eq!(executing.len(), 1);
    assert_eq!(executing[0].title, "A");

    let by_contact = client
        .deals_by_contact(8, Some(10))
        .await
        .expect("Failed to list by contact");
    assert_eq!(by_contact.len(), 1);
    assert_eq!(by_contact[0].title, "B");

    let by_company = client
        .deals_by_company(3, None)
        .await
        .expect("Failed to list by company");
    assert_eq!(by_company.len(), 2);

    let calls = server.state.calls_for("crm.deal.list");
    assert_eq!(calls[0].payload["order"], json!({"DATE_MODIFY": "DESC"}));
    assert_eq!(calls[1].payload["filter"], json!({"CONTACT_ID": "8"}));
    assert_eq!(calls[1].payload["order"], json!({"DATE_CREATE": "DESC"}));
    assert_eq!(calls[1].payload["limit"], json!(10));
    assert_eq!(calls[2].payload["order"], json!({"DATE_CREATE": "DESC"}));
}

#[tokio::test]
async fn test_open_and_closed_deals() {
    let server = spawn_mock().await;
    let client = create_test_client(&server).expect("Failed to create client");
    let open_id = seed(&client, DealFields::new().title("Open")).await;
    let closed_id = seed(&client, DealFields::new().title("Closed")).await;
    client
        .close_deal(&closed_id, None)
        .await
        .expect("Failed to close deal");

    let open = client.open_deals(None).await.expect("Failed to list open deals");
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].id.as_deref(), Some(open_id.as_str()));

    let closed = client
        .closed_deals(None)
        .await
        .expect("Failed to list closed deals");
    assert_eq!(closed.len(), 1);
    assert!(closed[0].closed);
    assert_eq!(closed[0].stage_id, "WON");
}

#[tokio::test]
async fn test_list_empty() {
    let server = spawn_mock().await;
    let client = create_test_client(&server).expect("Failed to create client");

    let page = client
        .list_deals_page(&ListParams::default())
        .await
        .expect("Failed to list deals");

    assert!(page.deals.is_empty());
    assert_eq!(page.total, Some(0));
    assert!(page.next.is_none());
}

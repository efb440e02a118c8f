use chrono::{Duration, Utc};
use sea_orm::Database;

use migration::MigratorTrait;
use store::{
    Currency, DialogContext, DialogState, OperationContext, SelectionSource, Store, StoreError,
    TransactionDraft, TransactionType, UserPreferences, UserSession,
};

async fn store() -> Store {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    Store::builder().database(db).build().unwrap()
}

fn session(telegram_id: i64) -> UserSession {
    let now = Utc::now();
    UserSession {
        telegram_id,
        user_id: "u-1".to_string(),
        tenant_id: "t-1".to_string(),
        access_token: "access".to_string(),
        refresh_token: "refresh".to_string(),
        access_expires_at: now + Duration::minutes(15),
        refresh_expires_at: now + Duration::days(30),
        created_at: now,
        updated_at: now,
    }
}

#[test]
fn builder_requires_database() {
    assert!(Store::builder().build().is_err());
}

#[tokio::test]
async fn session_upsert_replaces_tokens() {
    let store = store().await;
    store.save_session(&session(42)).await.unwrap();

    let mut updated = session(42);
    updated.access_token = "access-2".to_string();
    store.save_session(&updated).await.unwrap();

    let loaded = store.session(42).await.unwrap().unwrap();
    assert_eq!(loaded.access_token, "access-2");
    assert_eq!(loaded.user_id, "u-1");
}

#[tokio::test]
async fn session_with_empty_token_is_rejected() {
    let store = store().await;
    let mut bad = session(1);
    bad.refresh_token.clear();
    assert!(matches!(
        store.save_session(&bad).await,
        Err(StoreError::Invalid(_))
    ));
    assert!(store.session(1).await.unwrap().is_none());
}

#[tokio::test]
async fn session_tenant_switch_and_delete() {
    let store = store().await;
    assert!(matches!(
        store.update_session_tenant(7, "t-2").await,
        Err(StoreError::NotFound(_))
    ));

    store.save_session(&session(7)).await.unwrap();
    store.update_session_tenant(7, "t-2").await.unwrap();
    let loaded = store.session(7).await.unwrap().unwrap();
    assert_eq!(loaded.tenant_id, "t-2");
    assert_eq!(loaded.access_token, "access");

    store.delete_session(7).await.unwrap();
    store.delete_session(7).await.unwrap();
    assert!(store.session(7).await.unwrap().is_none());
}

#[tokio::test]
async fn dialog_state_round_trip_and_idle_clears() {
    let store = store().await;
    let ctx = DialogContext::new()
        .with("auth_token", "tok")
        .with("attempts", 2_i64);
    store
        .set_state(5, DialogState::WaitingForOauthCode, None, &ctx)
        .await
        .unwrap();

    let record = store.state(5).await.unwrap().unwrap();
    assert_eq!(record.state, DialogState::WaitingForOauthCode);
    assert_eq!(record.context.text("auth_token"), Some("tok"));
    assert_eq!(record.context.int("attempts"), Some(2));
    assert!(record.draft_id.is_none());

    store
        .set_state(5, DialogState::Idle, None, &DialogContext::new())
        .await
        .unwrap();
    assert!(store.state(5).await.unwrap().is_none());
}

#[tokio::test]
async fn draft_reference_only_in_draft_states() {
    let store = store().await;
    let err = store
        .set_state(
            9,
            DialogState::WaitingForOauthEmail,
            Some("d-1"),
            &DialogContext::new(),
        )
        .await;
    assert!(matches!(err, Err(StoreError::Invalid(_))));

    store
        .set_state(
            9,
            DialogState::WaitingForCategory,
            Some("d-1"),
            &DialogContext::new(),
        )
        .await
        .unwrap();
    let record = store.state(9).await.unwrap().unwrap();
    assert_eq!(record.draft_id.as_deref(), Some("d-1"));

    store.clear_state(9).await.unwrap();
    assert!(store.state(9).await.unwrap().is_none());
}

#[tokio::test]
async fn mappings_are_normalized_and_unique_per_tenant() {
    let store = store().await;
    let first = store.add_mapping("t", "  Такси ", "cat-1", 0).await.unwrap();
    assert_eq!(first.keyword, "такси");

    let again = store.add_mapping("t", "ТАКСИ", "cat-2", 5).await.unwrap();
    assert_eq!(again.id, first.id);
    assert_eq!(again.category_id, "cat-2");
    assert_eq!(again.priority, 5);

    store.add_mapping("t", "кофе", "cat-3", 0).await.unwrap();
    store.add_mapping("other", "такси", "cat-9", 0).await.unwrap();

    let list = store.list_mappings("t").await.unwrap();
    let keywords: Vec<_> = list.iter().map(|m| m.keyword.as_str()).collect();
    assert_eq!(keywords, ["такси", "кофе"]);

    let found = store.find_mapping("t", "Такси").await.unwrap().unwrap();
    assert_eq!(found.category_id, "cat-2");

    assert!(store.remove_mapping("t", "такси").await.unwrap());
    assert!(!store.remove_mapping("t", "такси").await.unwrap());
    assert_eq!(store.list_mappings("other").await.unwrap().len(), 1);
}

#[tokio::test]
async fn empty_mapping_keyword_is_rejected() {
    let store = store().await;
    assert!(matches!(
        store.add_mapping("t", "   ", "cat", 0).await,
        Err(StoreError::Invalid(_))
    ));
}

#[tokio::test]
async fn preferences_keep_unset_currency() {
    let store = store().await;
    assert!(store.preferences(3).await.unwrap().is_none());

    let mut prefs = UserPreferences::new(3);
    prefs.language = "en".to_string();
    store.save_preferences(&prefs).await.unwrap();

    let loaded = store.preferences(3).await.unwrap().unwrap();
    assert_eq!(loaded.language, "en");
    assert_eq!(loaded.default_currency, None);

    prefs.default_currency = Some(Currency::Eur);
    store.save_preferences(&prefs).await.unwrap();
    let loaded = store.preferences(3).await.unwrap().unwrap();
    assert_eq!(loaded.default_currency, Some(Currency::Eur));
    assert_eq!(loaded.language, "en");
}

#[tokio::test]
async fn drafts_create_read_delete() {
    let store = store().await;
    let draft = TransactionDraft {
        id: "d-1".to_string(),
        telegram_id: 11,
        kind: TransactionType::Income,
        amount_minor: 5_000_000,
        currency: Currency::Rub,
        description: "зарплата".to_string(),
        category_id: None,
        occurred_at: None,
        created_at: Utc::now(),
    };
    store.create_draft(&draft).await.unwrap();

    let loaded = store.draft("d-1").await.unwrap().unwrap();
    assert_eq!(loaded.kind, TransactionType::Income);
    assert_eq!(loaded.amount_minor, 5_000_000);
    assert_eq!(loaded.description, "зарплата");

    store.delete_draft("d-1").await.unwrap();
    assert!(store.draft("d-1").await.unwrap().is_none());
}

#[tokio::test]
async fn operation_context_keeps_category_list_order() {
    let store = store().await;
    let now = Utc::now();
    let mut op = OperationContext {
        op_id: "op1".to_string(),
        telegram_id: 12,
        tenant_id: "t".to_string(),
        draft_id: Some("d-2".to_string()),
        transaction_id: None,
        description_original: "такси домой".to_string(),
        category_id_selected: None,
        category_name_selected: None,
        selection_source: SelectionSource::Manual,
        kind: TransactionType::Expense,
        amount_minor: 45_000,
        currency: Currency::Rub,
        occurred_at: None,
        category_list: vec!["c-3".to_string(), "c-1".to_string(), "c-2".to_string()],
        category_list_message_id: Some(100),
        confirmation_message_id: None,
        created_at: now,
        updated_at: now,
    };
    store.save_operation(&op).await.unwrap();

    op.category_id_selected = Some("c-1".to_string());
    op.selection_source = SelectionSource::Keyword;
    op.transaction_id = Some("tx-1".to_string());
    store.save_operation(&op).await.unwrap();

    let loaded = store.operation("op1").await.unwrap().unwrap();
    assert_eq!(loaded.category_list, ["c-3", "c-1", "c-2"]);
    assert_eq!(loaded.category_id_selected.as_deref(), Some("c-1"));
    assert_eq!(loaded.selection_source, SelectionSource::Keyword);
    assert_eq!(loaded.category_list_message_id, Some(100));

    store.delete_operation("op1").await.unwrap();
    assert!(store.operation("op1").await.unwrap().is_none());
}

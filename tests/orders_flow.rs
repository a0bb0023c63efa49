use marketplace_api::{
    db::{create_orm_conn, create_pool, run_migrations},
    dto::orders::{CheckoutItem, CheckoutRequest},
    entity::{
        categories::ActiveModel as CategoryActive, products::ActiveModel as ProductActive,
        users::ActiveModel as UserActive,
    },
    error::AppError,
    middleware::auth::AuthUser,
    repo,
    services::order_service,
    slug::slugify,
    state::AppState,
};
use sea_orm::ActiveValue::NotSet;
use sea_orm::{ActiveModelTrait, ConnectionTrait, EntityTrait, Set, Statement};
use uuid::Uuid;

// Integration flow: buyer checks out an item list; totals, stock decrements
// and the all-or-nothing failure paths are observed through the repository.
#[tokio::test]
async fn checkout_flow_and_failure_paths() -> anyhow::Result<()> {
    // Allow skipping when no DB is configured in the environment.
    let database_url =
        match std::env::var("TEST_DATABASE_URL").or_else(|_| std::env::var("DATABASE_URL")) {
            Ok(url) => url,
            Err(_) => {
                eprintln!(
                    "Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run integration flow tests."
                );
                return Ok(());
            }
        };

    let state = setup_state(&database_url).await?;

    let buyer_id = create_user(&state, "buyer", "buyer@example.com").await?;
    let admin_id = create_user(&state, "admin", "admin@example.com").await?;
    let buyer = AuthUser {
        user_id: buyer_id,
        role: "buyer".into(),
    };

    let category_id = create_category(&state, "Furniture").await?;
    let desk = create_product(&state, category_id, "Meja Makan", 50_000, 10).await?;
    let mug = create_product(&state, category_id, "Ferris Mug", 120_000, 2).await?;

    // Successful checkout: server-side total, stock decremented by the
    // requested quantity.
    let resp = order_service::create_order(
        &state,
        &buyer,
        &CheckoutRequest {
            shipping_address: "Jl. Jenderal Sudirman No. 1, Jakarta".into(),
            items: vec![CheckoutItem {
                product_id: desk,
                quantity: 3,
            }],
        },
    )
    .await?;
    let data = resp.data.expect("checkout data");
    assert_eq!(data.total, 150_000);
    assert!(data.order_code.starts_with("INV/"));
    assert_eq!(stock_of(&state, desk).await?, 7);

    // One short line fails the whole checkout: the satisfiable desk line must
    // not decrement either.
    let err = order_service::create_order(
        &state,
        &buyer,
        &CheckoutRequest {
            shipping_address: "Jl. Soekarno Hatta No. 123".into(),
            items: vec![
                CheckoutItem {
                    product_id: desk,
                    quantity: 1,
                },
                CheckoutItem {
                    product_id: mug,
                    quantity: 5,
                },
            ],
        },
    )
    .await
    .unwrap_err();
    match err {
        AppError::InsufficientStock { name } => assert_eq!(name, "Ferris Mug"),
        other => panic!("expected InsufficientStock, got {other:?}"),
    }
    assert_eq!(stock_of(&state, desk).await?, 7);
    assert_eq!(stock_of(&state, mug).await?, 2);
    assert_eq!(order_count(&state).await?, 1);

    // Unknown product id: typed failure, zero side effects.
    let err = order_service::create_order(
        &state,
        &buyer,
        &CheckoutRequest {
            shipping_address: "Jl. Soekarno Hatta No. 123".into(),
            items: vec![CheckoutItem {
                product_id: Uuid::new_v4(),
                quantity: 1,
            }],
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::ProductNotFound));
    assert_eq!(order_count(&state).await?, 1);

    // A second order so listing order is observable.
    order_service::create_order(
        &state,
        &buyer,
        &CheckoutRequest {
            shipping_address: "Jl. Jenderal Sudirman No. 1, Jakarta".into(),
            items: vec![CheckoutItem {
                product_id: mug,
                quantity: 1,
            }],
        },
    )
    .await?;

    // Buyer's listing: newest first, items materialized with products.
    let mine = repo::orders::find_orders_for_user(&state.orm, buyer_id).await?;
    assert_eq!(mine.len(), 2);
    assert!(mine[0].order.created_at >= mine[1].order.created_at);
    assert_eq!(mine[1].order.total_amount, 150_000);
    assert_eq!(mine[1].items.len(), 1);
    let line = &mine[1].items[0];
    assert_eq!(line.item.quantity, 3);
    assert_eq!(line.item.price, 50_000);
    assert_eq!(
        line.product.as_ref().map(|p| p.name.as_str()),
        Some("Meja Makan")
    );

    // Admin-wide listing sees the same orders; other users own none.
    let all = repo::orders::find_all_orders(&state.orm).await?;
    assert_eq!(all.len(), 2);
    let theirs = repo::orders::find_orders_for_user(&state.orm, admin_id).await?;
    assert!(theirs.is_empty());

    // Single-order lookup round-trips the aggregate.
    let detail = repo::orders::find_order_by_id(&state.orm, mine[1].order.id).await?;
    assert_eq!(detail.order.order_code, mine[1].order.order_code);
    assert_eq!(detail.items.len(), 1);
    assert!(matches!(
        repo::orders::find_order_by_id(&state.orm, Uuid::new_v4())
            .await
            .unwrap_err(),
        AppError::NotFound
    ));

    Ok(())
}

async fn setup_state(database_url: &str) -> anyhow::Result<AppState> {
    let pool = create_pool(database_url).await?;
    let orm = create_orm_conn(database_url).await?;
    run_migrations(&orm).await?;

    // Clean tables between runs
    let backend = orm.get_database_backend();
    orm.execute(Statement::from_string(
        backend,
        "TRUNCATE TABLE order_items, orders, products, categories, audit_logs, users RESTART IDENTITY CASCADE",
    ))
    .await?;

    Ok(AppState { pool, orm })
}

async fn create_user(state: &AppState, role: &str, email: &str) -> anyhow::Result<Uuid> {
    let user = UserActive {
        id: Set(Uuid::new_v4()),
        name: Set(format!("{role} user")),
        email: Set(email.to_string()),
        password_hash: Set("dummy".into()),
        role: Set(role.into()),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    Ok(user.id)
}

async fn create_category(state: &AppState, name: &str) -> anyhow::Result<Uuid> {
    let category = CategoryActive {
        id: Set(Uuid::new_v4()),
        name: Set(name.to_string()),
        slug: Set(slugify(name)),
        description: Set(None),
        is_active: Set(true),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    Ok(category.id)
}

async fn create_product(
    state: &AppState,
    category_id: Uuid,
    name: &str,
    price: i64,
    stock: i32,
) -> anyhow::Result<Uuid> {
    let product = ProductActive {
        id: Set(Uuid::new_v4()),
        category_id: Set(category_id),
        name: Set(name.to_string()),
        slug: Set(slugify(name)),
        description: Set(None),
        price: Set(price),
        stock: Set(stock),
        image: Set(None),
        is_active: Set(true),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    Ok(product.id)
}

async fn stock_of(state: &AppState, product_id: Uuid) -> anyhow::Result<i32> {
    let product = marketplace_api::entity::Products::find_by_id(product_id)
        .one(&state.orm)
        .await?
        .expect("product exists");
    Ok(product.stock)
}

async fn order_count(state: &AppState) -> anyhow::Result<u64> {
    use sea_orm::PaginatorTrait;
    Ok(marketplace_api::entity::Orders::find()
        .count(&state.orm)
        .await?)
}

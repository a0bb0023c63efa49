use marketplace_api::{
    db::{create_orm_conn, create_pool, run_migrations},
    dto::orders::{CheckoutItem, CheckoutRequest},
    entity::{
        categories::ActiveModel as CategoryActive, products::ActiveModel as ProductActive,
        users::ActiveModel as UserActive,
    },
    error::AppError,
    middleware::auth::AuthUser,
    services::order_service,
    slug::slugify,
    state::AppState,
};
use sea_orm::ActiveValue::NotSet;
use sea_orm::{ActiveModelTrait, ConnectionTrait, EntityTrait, PaginatorTrait, Set, Statement};
use uuid::Uuid;

// Overselling race: with stock 5, two simultaneous checkouts for quantity 3
// must not both succeed. The row lock taken at the validation read serializes
// them; the loser observes the decremented stock and fails cleanly.
#[tokio::test]
async fn concurrent_checkouts_never_oversell() -> anyhow::Result<()> {
    let database_url =
        match std::env::var("TEST_DATABASE_URL").or_else(|_| std::env::var("DATABASE_URL")) {
            Ok(url) => url,
            Err(_) => {
                eprintln!(
                    "Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run concurrency tests."
                );
                return Ok(());
            }
        };

    let state = setup_state(&database_url).await?;

    let buyer_a = create_user(&state, "buyer", "a@example.com").await?;
    let buyer_b = create_user(&state, "buyer", "b@example.com").await?;
    let category_id = create_category(&state).await?;
    let product_id = create_product(&state, category_id, 5).await?;

    let task = |user_id: Uuid| {
        let state = state.clone();
        tokio::spawn(async move {
            let user = AuthUser {
                user_id,
                role: "buyer".into(),
            };
            let payload = CheckoutRequest {
                shipping_address: "Jl. Jenderal Sudirman No. 1".into(),
                items: vec![CheckoutItem {
                    product_id,
                    quantity: 3,
                }],
            };
            order_service::create_order(&state, &user, &payload).await
        })
    };

    let (first, second) = tokio::join!(task(buyer_a), task(buyer_b));
    let results = [first?, second?];

    let successes = results.iter().filter(|r| r.is_ok()).count();
    assert!(successes <= 1, "both checkouts drained the same stock");
    assert_eq!(successes, 1, "the lock winner should have succeeded");

    for result in &results {
        if let Err(err) = result {
            assert!(
                matches!(err, AppError::InsufficientStock { .. }),
                "loser must fail on stock, got {err:?}"
            );
        }
    }

    // Stock accounting closes: 5 minus the one successful decrement, and
    // exactly one order row exists.
    let product = marketplace_api::entity::Products::find_by_id(product_id)
        .one(&state.orm)
        .await?
        .expect("product exists");
    assert_eq!(product.stock, 5 - 3 * successes as i32);
    assert!(product.stock >= 0);

    let orders = marketplace_api::entity::Orders::find()
        .count(&state.orm)
        .await?;
    assert_eq!(orders as usize, successes);

    Ok(())
}

async fn setup_state(database_url: &str) -> anyhow::Result<AppState> {
    let pool = create_pool(database_url).await?;
    let orm = create_orm_conn(database_url).await?;
    run_migrations(&orm).await?;

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

async fn create_category(state: &AppState) -> anyhow::Result<Uuid> {
    let category = CategoryActive {
        id: Set(Uuid::new_v4()),
        name: Set("Merchandise".into()),
        slug: Set(slugify("Merchandise")),
        description: Set(None),
        is_active: Set(true),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    Ok(category.id)
}

async fn create_product(state: &AppState, category_id: Uuid, stock: i32) -> anyhow::Result<Uuid> {
    let product = ProductActive {
        id: Set(Uuid::new_v4()),
        category_id: Set(category_id),
        name: Set("Axum Hoodie".into()),
        slug: Set(slugify("Axum Hoodie")),
        description: Set(None),
        price: Set(550_000),
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

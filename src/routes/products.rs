use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
};
use sqlx::QueryBuilder;
use uuid::Uuid;
use validator::Validate;

use crate::{
    db::DbPool,
    dto::products::{CreateProductRequest, ProductDetail, ProductList, UpdateProductRequest},
    error::{AppError, AppResult, field_error},
    middleware::{
        auth::AuthUser,
        authorize::{Action, authorize},
    },
    models::{Category, Product},
    response::{ApiResponse, Meta},
    routes::params::ProductQuery,
    slug::slugify,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_products).post(create_product))
        .route(
            "/{id}",
            get(get_product).put(update_product).delete(delete_product),
        )
        .route("/category/{slug}", get(list_products_by_category_slug))
}

#[utoipa::path(
    get,
    path = "/api/products",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20"),
        ("category_id" = Option<Uuid>, Query, description = "Filter by category id"),
        ("category_slug" = Option<String>, Query, description = "Filter by category slug"),
        ("search" = Option<String>, Query, description = "Match against name/description"),
    ),
    responses(
        (status = 200, description = "List products", body = ApiResponse<ProductList>),
        (status = 404, description = "Unknown category slug")
    ),
    security(("bearer_auth" = [])),
    tag = "Products"
)]
pub async fn list_products(
    State(state): State<AppState>,
    _user: AuthUser,
    Query(query): Query<ProductQuery>,
) -> AppResult<Json<ApiResponse<ProductList>>> {
    let (page, limit, offset) = query.pagination.normalize();

    // An unknown slug is a miss, not an empty list.
    let category_id = match query.category_slug.as_ref().filter(|s| !s.is_empty()) {
        Some(slug) => Some(resolve_category_slug(&state.pool, slug).await?.id),
        None => query.category_id,
    };
    let search = query.search.as_ref().filter(|s| !s.is_empty());

    let mut builder = QueryBuilder::new("SELECT * FROM products WHERE 1=1");
    push_product_filters(&mut builder, category_id, search);
    builder
        .push(" ORDER BY created_at DESC LIMIT ")
        .push_bind(limit)
        .push(" OFFSET ")
        .push_bind(offset);
    let items = builder
        .build_query_as::<Product>()
        .fetch_all(&state.pool)
        .await?;

    let mut count_builder = QueryBuilder::new("SELECT COUNT(*) FROM products WHERE 1=1");
    push_product_filters(&mut count_builder, category_id, search);
    let total: i64 = count_builder
        .build_query_scalar()
        .fetch_one(&state.pool)
        .await?;

    Ok(Json(ApiResponse::success(
        "Product list",
        ProductList { items },
        Some(Meta::new(page, limit, total)),
    )))
}

fn push_product_filters(
    builder: &mut QueryBuilder<'_, sqlx::Postgres>,
    category_id: Option<Uuid>,
    search: Option<&String>,
) {
    if let Some(category_id) = category_id {
        builder.push(" AND category_id = ").push_bind(category_id);
    }
    if let Some(search) = search {
        let pattern = format!("%{search}%");
        builder
            .push(" AND (name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR description ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
}

async fn resolve_category_slug(pool: &DbPool, slug: &str) -> AppResult<Category> {
    sqlx::query_as::<_, Category>("SELECT * FROM categories WHERE slug = $1")
        .bind(slug)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound)
}

#[utoipa::path(
    get,
    path = "/api/products/category/{slug}",
    params(("slug" = String, Path, description = "Category slug")),
    responses(
        (status = 200, description = "Products in the category", body = ApiResponse<ProductList>),
        (status = 404, description = "Category not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Products"
)]
pub async fn list_products_by_category_slug(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(slug): Path<String>,
) -> AppResult<Json<ApiResponse<ProductList>>> {
    let category = resolve_category_slug(&state.pool, &slug).await?;

    let items = sqlx::query_as::<_, Product>(
        "SELECT * FROM products WHERE category_id = $1 ORDER BY created_at DESC",
    )
    .bind(category.id)
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(ApiResponse::success(
        "Product list by category",
        ProductList { items },
        Some(Meta::empty()),
    )))
}

#[utoipa::path(
    get,
    path = "/api/products/{id}",
    params(("id" = Uuid, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Product detail", body = ApiResponse<ProductDetail>),
        (status = 404, description = "Not Found")
    ),
    security(("bearer_auth" = [])),
    tag = "Products"
)]
pub async fn get_product(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<ProductDetail>>> {
    let product = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = $1")
        .bind(id)
        .fetch_optional(&state.pool)
        .await?
        .ok_or(AppError::NotFound)?;

    let category = sqlx::query_as::<_, Category>("SELECT * FROM categories WHERE id = $1")
        .bind(product.category_id)
        .fetch_optional(&state.pool)
        .await?;

    Ok(Json(ApiResponse::success(
        "Product detail",
        ProductDetail { product, category },
        None,
    )))
}

#[utoipa::path(
    post,
    path = "/api/products",
    request_body = CreateProductRequest,
    responses(
        (status = 201, description = "Create product", body = ApiResponse<Product>),
        (status = 403, description = "Forbidden"),
        (status = 422, description = "Validation error")
    ),
    security(("bearer_auth" = [])),
    tag = "Products"
)]
pub async fn create_product(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateProductRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<Product>>)> {
    authorize(&user, Action::ManageCatalog)?;
    payload.validate()?;
    ensure_category_exists(&state.pool, payload.category_id).await?;

    let product = sqlx::query_as::<_, Product>(
        r#"
        INSERT INTO products (id, category_id, name, slug, description, price, stock, image, is_active)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(payload.category_id)
    .bind(payload.name.as_str())
    .bind(slugify(&payload.name))
    .bind(payload.description)
    .bind(payload.price)
    .bind(payload.stock)
    .bind(payload.image)
    .bind(payload.is_active.unwrap_or(true))
    .fetch_one(&state.pool)
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(
            "Product created successfully",
            product,
            Some(Meta::empty()),
        )),
    ))
}

#[utoipa::path(
    put,
    path = "/api/products/{id}",
    params(("id" = Uuid, Path, description = "Product ID")),
    request_body = UpdateProductRequest,
    responses(
        (status = 200, description = "Product updated", body = ApiResponse<Product>),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Not Found"),
        (status = 422, description = "Validation error")
    ),
    security(("bearer_auth" = [])),
    tag = "Products"
)]
pub async fn update_product(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateProductRequest>,
) -> AppResult<Json<ApiResponse<Product>>> {
    authorize(&user, Action::ManageCatalog)?;
    payload.validate()?;

    let existing = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = $1")
        .bind(id)
        .fetch_optional(&state.pool)
        .await?
        .ok_or(AppError::NotFound)?;

    if let Some(category_id) = payload.category_id {
        ensure_category_exists(&state.pool, category_id).await?;
    }

    let (name, slug) = match payload.name {
        Some(name) => {
            let slug = slugify(&name);
            (name, slug)
        }
        None => (existing.name, existing.slug),
    };
    let category_id = payload.category_id.unwrap_or(existing.category_id);
    let description = payload.description.or(existing.description);
    let price = payload.price.unwrap_or(existing.price);
    let stock = payload.stock.unwrap_or(existing.stock);
    let image = payload.image.or(existing.image);
    let is_active = payload.is_active.unwrap_or(existing.is_active);

    let product = sqlx::query_as::<_, Product>(
        r#"
        UPDATE products
        SET category_id = $2, name = $3, slug = $4, description = $5,
            price = $6, stock = $7, image = $8, is_active = $9, updated_at = now()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(category_id)
    .bind(name)
    .bind(slug)
    .bind(description)
    .bind(price)
    .bind(stock)
    .bind(image)
    .bind(is_active)
    .fetch_one(&state.pool)
    .await?;

    Ok(Json(ApiResponse::success(
        "Product updated successfully",
        product,
        Some(Meta::empty()),
    )))
}

#[utoipa::path(
    delete,
    path = "/api/products/{id}",
    params(("id" = Uuid, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Product deleted"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Not Found")
    ),
    security(("bearer_auth" = [])),
    tag = "Products"
)]
pub async fn delete_product(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    authorize(&user, Action::ManageCatalog)?;

    let result = sqlx::query("DELETE FROM products WHERE id = $1")
        .bind(id)
        .execute(&state.pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound);
    }

    Ok(Json(ApiResponse::success(
        "Product deleted successfully",
        serde_json::json!({}),
        Some(Meta::empty()),
    )))
}

async fn ensure_category_exists(pool: &DbPool, category_id: Uuid) -> AppResult<()> {
    let exists: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM categories WHERE id = $1")
        .bind(category_id)
        .fetch_optional(pool)
        .await?;
    if exists.is_none() {
        return Err(field_error(
            "category_id",
            "exists",
            "category_id does not reference an existing category",
        ));
    }
    Ok(())
}

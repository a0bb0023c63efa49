use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::orders::{CheckoutData, CheckoutRequest, OrderDetail, OrderList},
    error::{AppError, AppResult},
    middleware::{
        auth::AuthUser,
        authorize::{Action, allows, authorize},
    },
    repo,
    response::{ApiResponse, Meta},
    services::order_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/orders", post(create_order).get(list_all_orders))
        .route("/orders/{id}", get(get_order))
        .route("/my-orders", get(my_orders))
}

#[utoipa::path(
    post,
    path = "/api/orders",
    request_body = CheckoutRequest,
    responses(
        (status = 201, description = "Order created", body = ApiResponse<CheckoutData>),
        (status = 403, description = "Forbidden"),
        (status = 422, description = "Validation error, unknown product, or insufficient stock")
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn create_order(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CheckoutRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<CheckoutData>>)> {
    authorize(&user, Action::PlaceOrder)?;
    payload.validate()?;
    let resp = order_service::create_order(&state, &user, &payload).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

#[utoipa::path(
    get,
    path = "/api/orders",
    responses(
        (status = 200, description = "All orders, newest first (admin only)", body = ApiResponse<OrderList>),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn list_all_orders(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<OrderList>>> {
    authorize(&user, Action::ViewAllOrders)?;
    let items = repo::orders::find_all_orders(&state.orm).await?;
    Ok(Json(ApiResponse::success(
        "Order list",
        OrderList { items },
        Some(Meta::empty()),
    )))
}

#[utoipa::path(
    get,
    path = "/api/my-orders",
    responses(
        (status = 200, description = "Caller's orders, newest first", body = ApiResponse<OrderList>)
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn my_orders(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<OrderList>>> {
    authorize(&user, Action::ViewOwnOrders)?;
    let items = repo::orders::find_orders_for_user(&state.orm, user.user_id).await?;
    Ok(Json(ApiResponse::success(
        "Your orders",
        OrderList { items },
        Some(Meta::empty()),
    )))
}

#[utoipa::path(
    get,
    path = "/api/orders/{id}",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Order with items", body = ApiResponse<OrderDetail>),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Not Found")
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<OrderDetail>>> {
    let detail = repo::orders::find_order_by_id(&state.orm, id).await?;

    // Owner or admin; anyone else is refused.
    if detail.order.user_id != user.user_id && !allows(&user.role, Action::ViewAllOrders) {
        return Err(AppError::Forbidden);
    }

    Ok(Json(ApiResponse::success(
        "Order detail",
        detail,
        Some(Meta::empty()),
    )))
}

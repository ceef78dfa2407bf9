use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DbErr, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, SqlErr,
};
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::Expr;
use sea_orm::sea_query::extension::postgres::PgExpr;
use uuid::Uuid;

use crate::{
    audit,
    dto::products::{CreateProductRequest, ProductList, UpdateProductRequest, UpdateProductStatusRequest},
    entity::products::{ActiveModel, Column, Entity as Products, Model as ProductModel},
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_employee},
    models::{Product, ProductStatus},
    response::{ApiResponse, Meta},
    routes::params::{ProductQuery, ProductSortBy, SortOrder},
    state::AppState,
    upload::{self, FormData},
};

impl CreateProductRequest {
    pub fn from_form(form: &FormData) -> AppResult<Self> {
        let request = Self {
            name: form.required("name")?.to_string(),
            description: form.required("description")?.to_string(),
            price: form.parse("price")?,
            quantity: form.parse("quantity")?,
            category: form.required("category")?.to_string(),
        };
        validate_amounts(Some(request.price), Some(request.quantity))?;
        Ok(request)
    }
}

fn validate_amounts(price: Option<i64>, quantity: Option<i32>) -> AppResult<()> {
    if price.is_some_and(|p| p < 0) {
        return Err(AppError::bad_request("price must not be negative"));
    }
    if quantity.is_some_and(|q| q < 0) {
        return Err(AppError::bad_request("quantity must not be negative"));
    }
    Ok(())
}

/// Product names are unique; a clash is the caller's mistake, not a server fault.
fn name_conflict(err: DbErr) -> AppError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => {
            AppError::Conflict("A product with this name already exists".into())
        }
        _ => AppError::from(err),
    }
}

fn non_blank(value: Option<String>, field: &str) -> AppResult<Option<String>> {
    match value.map(|v| v.trim().to_string()) {
        Some(v) if v.is_empty() => Err(AppError::bad_request(format!("{field} must not be empty"))),
        other => Ok(other),
    }
}

pub async fn list_products(
    state: &AppState,
    user: &AuthUser,
    query: ProductQuery,
) -> AppResult<ApiResponse<ProductList>> {
    ensure_employee(user)?;
    let status = query
        .status
        .as_deref()
        .filter(|s| !s.is_empty())
        .map(str::parse::<ProductStatus>)
        .transpose()?;
    search_products(state, query, status).await
}

pub async fn list_active_products(
    state: &AppState,
    query: ProductQuery,
) -> AppResult<ApiResponse<ProductList>> {
    search_products(state, query, Some(ProductStatus::Active)).await
}

async fn search_products(
    state: &AppState,
    query: ProductQuery,
    status: Option<ProductStatus>,
) -> AppResult<ApiResponse<ProductList>> {
    let (page, limit, offset) = query.pagination().normalize();
    let mut condition = Condition::all();

    if let Some(search) = query.q.as_ref().filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", search);
        condition = condition.add(
            Condition::any()
                .add(Expr::col(Column::Name).ilike(pattern.clone()))
                .add(Expr::col(Column::Description).ilike(pattern)),
        );
    }
    if let Some(category) = query.category.as_ref().filter(|s| !s.is_empty()) {
        condition = condition.add(Column::Category.eq(category.clone()));
    }
    if let Some(status) = status {
        condition = condition.add(Column::Status.eq(status));
    }
    if let Some(min_price) = query.min_price {
        condition = condition.add(Column::Price.gte(min_price));
    }
    if let Some(max_price) = query.max_price {
        condition = condition.add(Column::Price.lte(max_price));
    }

    let sort_col = match query.sort_by.unwrap_or(ProductSortBy::CreatedAt) {
        ProductSortBy::CreatedAt => Column::CreatedAt,
        ProductSortBy::Price => Column::Price,
        ProductSortBy::Name => Column::Name,
    };

    let mut finder = Products::find().filter(condition);
    finder = match query.sort_order.unwrap_or(SortOrder::Desc) {
        SortOrder::Asc => finder.order_by_asc(sort_col),
        SortOrder::Desc => finder.order_by_desc(sort_col),
    };

    let total = finder.clone().count(&state.orm).await? as i64;

    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(product_from_entity)
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success(
        "Products retrieved successfully",
        ProductList { items },
        Some(meta),
    ))
}

pub async fn get_product(state: &AppState, id: Uuid) -> AppResult<ApiResponse<Product>> {
    let product = find_product(state, id).await?;
    Ok(ApiResponse::success(
        "Product retrieved successfully",
        product_from_entity(product),
        Some(Meta::empty()),
    ))
}

pub async fn create_product(
    state: &AppState,
    user: &AuthUser,
    form: FormData,
) -> AppResult<ApiResponse<Product>> {
    ensure_employee(user)?;
    let payload = CreateProductRequest::from_form(&form)?;

    let dir = &state.config.upload_dir;
    let image = match &form.file {
        Some(file) => Some(upload::store_image(dir, file, state.config.upload_max_bytes).await?),
        None => None,
    };

    let active = ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(payload.name),
        description: Set(payload.description),
        image: Set(image.clone()),
        price: Set(payload.price),
        quantity: Set(payload.quantity),
        category: Set(payload.category),
        status: Set(ProductStatus::Active),
        created_at: NotSet,
        updated_at: NotSet,
    };
    let product = match active.insert(&state.orm).await {
        Ok(product) => product,
        Err(err) => {
            if let Some(name) = &image {
                upload::discard(dir, name).await;
            }
            return Err(name_conflict(err));
        }
    };

    audit::record(
        &state.pool,
        user,
        "product_create",
        "products",
        serde_json::json!({ "product_id": product.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Product added successfully",
        product_from_entity(product),
        Some(Meta::empty()),
    ))
}

pub async fn update_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    ensure_employee(user)?;
    validate_amounts(payload.price, payload.quantity)?;
    let name = non_blank(payload.name, "name")?;
    let description = non_blank(payload.description, "description")?;
    let category = non_blank(payload.category, "category")?;

    let existing = find_product(state, id).await?;

    let mut active: ActiveModel = existing.into();
    if let Some(name) = name {
        active.name = Set(name);
    }
    if let Some(description) = description {
        active.description = Set(description);
    }
    if let Some(category) = category {
        active.category = Set(category);
    }
    if let Some(price) = payload.price {
        active.price = Set(price);
    }
    if let Some(quantity) = payload.quantity {
        active.quantity = Set(quantity);
    }
    active.updated_at = Set(Utc::now().into());

    let product = active.update(&state.orm).await.map_err(name_conflict)?;

    audit::record(
        &state.pool,
        user,
        "product_update",
        "products",
        serde_json::json!({ "product_id": product.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Product updated successfully",
        product_from_entity(product),
        Some(Meta::empty()),
    ))
}

pub async fn update_product_status(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateProductStatusRequest,
) -> AppResult<ApiResponse<Product>> {
    ensure_employee(user)?;
    let status: ProductStatus = payload.status.parse()?;

    let existing = find_product(state, id).await?;
    let mut active: ActiveModel = existing.into();
    active.status = Set(status);
    active.updated_at = Set(Utc::now().into());
    let product = active.update(&state.orm).await?;

    audit::record(
        &state.pool,
        user,
        "product_status_update",
        "products",
        serde_json::json!({ "product_id": product.id, "status": status }),
    )
    .await;

    Ok(ApiResponse::success(
        "Product status updated successfully",
        product_from_entity(product),
        Some(Meta::empty()),
    ))
}

pub async fn update_product_image(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    form: FormData,
) -> AppResult<ApiResponse<Product>> {
    ensure_employee(user)?;
    let file = form
        .file
        .as_ref()
        .ok_or_else(|| AppError::bad_request("image is required"))?;

    let existing = find_product(state, id).await?;
    let previous = existing.image.clone();

    let dir = &state.config.upload_dir;
    let name = upload::store_image(dir, file, state.config.upload_max_bytes).await?;

    let mut active: ActiveModel = existing.into();
    active.image = Set(Some(name.clone()));
    active.updated_at = Set(Utc::now().into());
    let product = match active.update(&state.orm).await {
        Ok(product) => product,
        Err(err) => {
            upload::discard(dir, &name).await;
            return Err(err.into());
        }
    };

    if let Some(previous) = previous {
        upload::discard(dir, &previous).await;
    }

    audit::record(
        &state.pool,
        user,
        "product_image_update",
        "products",
        serde_json::json!({ "product_id": product.id, "image": name }),
    )
    .await;

    Ok(ApiResponse::success(
        "Product updated successfully",
        product_from_entity(product),
        Some(Meta::empty()),
    ))
}

pub async fn delete_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_employee(user)?;
    let existing = find_product(state, id).await?;
    Products::delete_by_id(id).exec(&state.orm).await?;

    if let Some(image) = &existing.image {
        upload::discard(&state.config.upload_dir, image).await;
    }

    audit::record(
        &state.pool,
        user,
        "product_delete",
        "products",
        serde_json::json!({ "product_id": id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Product deleted successfully",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

async fn find_product(state: &AppState, id: Uuid) -> AppResult<ProductModel> {
    Products::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::not_found("Product not found"))
}

pub fn product_from_entity(model: ProductModel) -> Product {
    Product {
        id: model.id,
        name: model.name,
        description: model.description,
        image: model.image,
        price: model.price,
        quantity: model.quantity,
        category: model.category,
        status: model.status,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(pairs: &[(&str, &str)]) -> FormData {
        let mut form = FormData::default();
        for (k, v) in pairs {
            form.fields.insert((*k).to_string(), (*v).to_string());
        }
        form
    }

    #[test]
    fn builds_a_product_from_a_complete_form() {
        let req = CreateProductRequest::from_form(&form(&[
            ("name", "Ferris Mug"),
            ("description", "Coffee tastes better"),
            ("price", "1200"),
            ("quantity", "4"),
            ("category", "kitchen"),
        ]))
        .unwrap();
        assert_eq!(req.name, "Ferris Mug");
        assert_eq!(req.price, 1200);
        assert_eq!(req.quantity, 4);
    }

    #[test]
    fn rejects_missing_or_negative_fields() {
        let missing = CreateProductRequest::from_form(&form(&[("name", "Mug")]));
        assert!(matches!(missing, Err(AppError::BadRequest(_))));

        let negative = CreateProductRequest::from_form(&form(&[
            ("name", "Mug"),
            ("description", "d"),
            ("price", "-1"),
            ("quantity", "1"),
            ("category", "c"),
        ]));
        assert!(matches!(negative, Err(AppError::BadRequest(_))));
    }

    #[test]
    fn other_database_errors_stay_server_errors() {
        let err = name_conflict(DbErr::Custom("connection reset".into()));
        assert!(matches!(err, AppError::OrmError(_)));
    }

    #[test]
    fn partial_update_rejects_blank_text() {
        assert!(non_blank(Some("  ".into()), "name").is_err());
        assert_eq!(non_blank(None, "name").unwrap(), None);
        assert_eq!(
            non_blank(Some(" Mug ".into()), "name").unwrap(),
            Some("Mug".to_string())
        );
    }
}

//! Vehicle listing endpoints: create, browse with filters, seller dashboard
//! and image upload.

use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    Json,
};
use sqlx::QueryBuilder;
use std::path::Path as FsPath;
use std::sync::Arc;
use uuid::Uuid;

use crate::db::{
    vehicle_status, Bid, CreateVehicleRequest, User, Vehicle, VehicleFilter, VehicleResponse,
};
use crate::notifications::MarketEvent;
use crate::AppState;

use super::error::ApiError;
use super::validation::{
    validate_brand, validate_description, validate_mileage, validate_model, validate_price,
    validate_year,
};

/// Per-file cap for image uploads (5 MiB)
const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

/// Request body budget for the image upload route. Must exceed
/// `MAX_IMAGE_BYTES` or the per-file check is unreachable; sized for a batch
/// of full-size images plus multipart framing.
pub(super) const MAX_UPLOAD_BODY_BYTES: usize = 32 * 1024 * 1024;

fn validate_create_request(req: &CreateVehicleRequest) -> Result<(), ApiError> {
    validate_brand(&req.brand).map_err(ApiError::validation)?;
    validate_model(&req.model).map_err(ApiError::validation)?;
    validate_year(req.year).map_err(ApiError::validation)?;
    validate_price(req.price).map_err(ApiError::validation)?;
    if req.vehicle_type.trim().is_empty() {
        return Err(ApiError::validation("Vehicle type is required"));
    }
    if let Some(mileage) = req.mileage {
        validate_mileage(mileage).map_err(ApiError::validation)?;
    }
    if let Some(ref description) = req.description {
        validate_description(description).map_err(ApiError::validation)?;
    }
    Ok(())
}

/// Create a new listing
///
/// POST /api/vehicles
pub async fn create_vehicle(
    State(state): State<Arc<AppState>>,
    user: User,
    Json(req): Json<CreateVehicleRequest>,
) -> Result<(StatusCode, Json<VehicleResponse>), ApiError> {
    validate_create_request(&req)?;

    let vehicle = Vehicle {
        id: Uuid::new_v4().to_string(),
        seller_id: user.id.clone(),
        brand: req.brand,
        model: req.model,
        year: req.year,
        price: req.price,
        vehicle_type: req.vehicle_type,
        condition: req.condition.unwrap_or_else(|| "used".to_string()),
        mileage: req.mileage.unwrap_or(0),
        description: req.description.unwrap_or_default(),
        images: "[]".to_string(),
        contact_name: req.contact_name.unwrap_or(user.name),
        contact_phone: req.contact_phone.unwrap_or(user.phone),
        status: vehicle_status::AVAILABLE.to_string(),
        created_at: chrono::Utc::now().to_rfc3339(),
    };

    sqlx::query(
        "INSERT INTO vehicles (id, seller_id, brand, model, year, price, vehicle_type,
                               condition, mileage, description, images, contact_name,
                               contact_phone, status, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&vehicle.id)
    .bind(&vehicle.seller_id)
    .bind(&vehicle.brand)
    .bind(&vehicle.model)
    .bind(vehicle.year)
    .bind(vehicle.price)
    .bind(&vehicle.vehicle_type)
    .bind(&vehicle.condition)
    .bind(vehicle.mileage)
    .bind(&vehicle.description)
    .bind(&vehicle.images)
    .bind(&vehicle.contact_name)
    .bind(&vehicle.contact_phone)
    .bind(&vehicle.status)
    .bind(&vehicle.created_at)
    .execute(&state.db)
    .await?;

    tracing::info!(vehicle_id = %vehicle.id, brand = %vehicle.brand, "Listing created");

    let response = vehicle.to_response();
    state.events.publish(MarketEvent::NewVehicle {
        vehicle: response.clone(),
    });

    Ok((StatusCode::CREATED, Json(response)))
}

/// Browse listings with optional filters, newest first
///
/// GET /api/vehicles
pub async fn list_vehicles(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<VehicleFilter>,
) -> Result<Json<Vec<VehicleResponse>>, ApiError> {
    let mut query: QueryBuilder<sqlx::Sqlite> =
        QueryBuilder::new("SELECT * FROM vehicles WHERE 1=1");

    if let Some(ref brand) = filter.brand {
        query.push(" AND brand = ").push_bind(brand).push(" COLLATE NOCASE");
    }
    if let Some(ref vehicle_type) = filter.vehicle_type {
        query
            .push(" AND vehicle_type = ")
            .push_bind(vehicle_type)
            .push(" COLLATE NOCASE");
    }
    if let Some(min_price) = filter.min_price {
        query.push(" AND price >= ").push_bind(min_price);
    }
    if let Some(max_price) = filter.max_price {
        query.push(" AND price <= ").push_bind(max_price);
    }
    if let Some(min_year) = filter.min_year {
        query.push(" AND year >= ").push_bind(min_year);
    }
    if let Some(max_year) = filter.max_year {
        query.push(" AND year <= ").push_bind(max_year);
    }
    if let Some(ref status) = filter.status {
        query.push(" AND status = ").push_bind(status);
    }
    query.push(" ORDER BY created_at DESC");

    let vehicles: Vec<Vehicle> = query.build_query_as().fetch_all(&state.db).await?;

    Ok(Json(vehicles.iter().map(Vehicle::to_response).collect()))
}

/// Fetch a single listing
///
/// GET /api/vehicles/:id
pub async fn get_vehicle(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<VehicleResponse>, ApiError> {
    let vehicle: Vehicle = sqlx::query_as("SELECT * FROM vehicles WHERE id = ?")
        .bind(&id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("Vehicle not found"))?;

    Ok(Json(vehicle.to_response()))
}

/// The caller's own listings, newest first
///
/// GET /api/vehicles/mine
pub async fn my_vehicles(
    State(state): State<Arc<AppState>>,
    user: User,
) -> Result<Json<Vec<VehicleResponse>>, ApiError> {
    let vehicles: Vec<Vehicle> =
        sqlx::query_as("SELECT * FROM vehicles WHERE seller_id = ? ORDER BY created_at DESC")
            .bind(&user.id)
            .fetch_all(&state.db)
            .await?;

    Ok(Json(vehicles.iter().map(Vehicle::to_response).collect()))
}

/// Pending bids for a listing, highest first
///
/// GET /api/vehicles/:id/bids
pub async fn list_vehicle_bids(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<Bid>>, ApiError> {
    let bids = state.bidding.list_bids(&id).await?;
    Ok(Json(bids))
}

/// Map an image content type to a file extension; anything else is rejected.
fn image_extension(content_type: &str) -> Option<&'static str> {
    match content_type {
        "image/jpeg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        _ => None,
    }
}

/// Write one uploaded image to the uploads directory and return its URL path.
async fn save_image(
    uploads_dir: &FsPath,
    content_type: &str,
    data: &[u8],
) -> Result<String, ApiError> {
    let ext = image_extension(content_type).ok_or_else(|| {
        ApiError::validation("Unsupported image type (use jpeg, png or webp)")
    })?;

    if data.is_empty() {
        return Err(ApiError::validation("Uploaded file is empty"));
    }
    if data.len() > MAX_IMAGE_BYTES {
        return Err(ApiError::validation("Image exceeds the 5 MiB limit"));
    }

    let file_name = format!("{}.{}", Uuid::new_v4(), ext);
    tokio::fs::create_dir_all(uploads_dir)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to create uploads dir: {}", e)))?;
    tokio::fs::write(uploads_dir.join(&file_name), data)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to store image: {}", e)))?;

    Ok(format!("/uploads/{}", file_name))
}

/// Append new image URLs to a vehicle's list. Runs under the vehicle's
/// single-writer lock so two in-flight batches cannot read the same list and
/// overwrite each other's appends.
async fn append_image_urls(
    state: &AppState,
    vehicle_id: &str,
    new_urls: &[String],
) -> Result<Vehicle, ApiError> {
    let _guard = state.bidding.lock_vehicle(vehicle_id).await;

    let vehicle: Vehicle = sqlx::query_as("SELECT * FROM vehicles WHERE id = ?")
        .bind(vehicle_id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("Vehicle not found"))?;

    let mut urls = vehicle.image_urls();
    urls.extend(new_urls.iter().cloned());

    let images_json = serde_json::to_string(&urls)
        .map_err(|e| ApiError::internal(format!("Failed to encode image list: {}", e)))?;
    sqlx::query("UPDATE vehicles SET images = ? WHERE id = ?")
        .bind(&images_json)
        .bind(vehicle_id)
        .execute(&state.db)
        .await?;

    Ok(Vehicle {
        images: images_json,
        ..vehicle
    })
}

/// Upload images for a listing (multipart form, seller only). New URLs are
/// appended to the vehicle's image list in upload order.
///
/// POST /api/vehicles/:id/images
pub async fn upload_images(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(id): Path<String>,
    mut multipart: Multipart,
) -> Result<Json<VehicleResponse>, ApiError> {
    let vehicle: Vehicle = sqlx::query_as("SELECT * FROM vehicles WHERE id = ?")
        .bind(&id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("Vehicle not found"))?;

    if vehicle.seller_id != user.id {
        return Err(ApiError::forbidden(
            "Only the seller can upload images for this listing",
        ));
    }

    let mut new_urls = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Malformed multipart body: {}", e)))?
    {
        let content_type = field
            .content_type()
            .map(|ct| ct.to_string())
            .unwrap_or_default();
        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::bad_request(format!("Failed to read upload: {}", e)))?;

        let url = save_image(&state.uploads_dir, &content_type, &data).await?;
        new_urls.push(url);
    }

    if new_urls.is_empty() {
        return Err(ApiError::validation("No image files in request"));
    }

    let count = new_urls.len();
    let vehicle = append_image_urls(&state, &id, &new_urls).await?;

    tracing::info!(vehicle_id = %id, count, "Images uploaded");

    Ok(Json(vehicle.to_response()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::db;

    async fn state() -> Arc<AppState> {
        let pool = db::init_in_memory().await;
        let state = Arc::new(AppState::new(Config::default(), pool));
        sqlx::query(
            "INSERT INTO users (id, name, email, password_hash, phone)
             VALUES ('seller', 'Sam Seller', 'sam@example.com', 'x', '555')",
        )
        .execute(&state.db)
        .await
        .unwrap();
        state
    }

    /// Like `state()` but with uploads rooted in a scratch directory.
    async fn state_in(data_dir: &FsPath) -> Arc<AppState> {
        let pool = db::init_in_memory().await;
        let mut config = Config::default();
        config.server.data_dir = data_dir.to_path_buf();
        let state = Arc::new(AppState::new(config, pool));
        sqlx::query(
            "INSERT INTO users (id, name, email, password_hash, phone)
             VALUES ('seller', 'Sam Seller', 'sam@example.com', 'x', '555')",
        )
        .execute(&state.db)
        .await
        .unwrap();
        state
    }

    async fn insert_raw_vehicle(state: &Arc<AppState>, id: &str) {
        sqlx::query(
            "INSERT INTO vehicles (id, seller_id, brand, model, year, price, vehicle_type)
             VALUES (?, 'seller', 'Toyota', 'Corolla', 2018, 10000, 'sedan')",
        )
        .bind(id)
        .execute(&state.db)
        .await
        .unwrap();
    }

    async fn seller(state: &Arc<AppState>) -> User {
        sqlx::query_as("SELECT * FROM users WHERE id = 'seller'")
            .fetch_one(&state.db)
            .await
            .unwrap()
    }

    fn request(brand: &str, year: i64, price: i64) -> CreateVehicleRequest {
        CreateVehicleRequest {
            brand: brand.into(),
            model: "Model".into(),
            year,
            price,
            vehicle_type: "sedan".into(),
            condition: None,
            mileage: Some(42000),
            description: Some("well kept".into()),
            contact_name: None,
            contact_phone: None,
        }
    }

    #[tokio::test]
    async fn create_and_fetch_vehicle() {
        let state = state().await;
        let user = seller(&state).await;

        let (status, Json(created)) =
            create_vehicle(State(state.clone()), user, Json(request("Toyota", 2018, 10000)))
                .await
                .unwrap();
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created.status, "available");
        // Contact defaults to the seller's profile
        assert_eq!(created.contact_name, "Sam Seller");

        let Json(fetched) = get_vehicle(State(state), Path(created.id.clone()))
            .await
            .unwrap();
        assert_eq!(fetched.id, created.id);
    }

    #[tokio::test]
    async fn invalid_year_and_price_are_rejected() {
        let state = state().await;
        let user = seller(&state).await;

        let err = create_vehicle(
            State(state.clone()),
            user.clone(),
            Json(request("Toyota", 1850, 10000)),
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("Year"));

        let err = create_vehicle(State(state), user, Json(request("Toyota", 2018, 0)))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Price"));
    }

    #[tokio::test]
    async fn missing_vehicle_is_not_found() {
        let state = state().await;
        let err = get_vehicle(State(state), Path("nope".into()))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[tokio::test]
    async fn filters_narrow_the_listing() {
        let state = state().await;
        let user = seller(&state).await;

        create_vehicle(State(state.clone()), user.clone(), Json(request("Toyota", 2018, 10000)))
            .await
            .unwrap();
        create_vehicle(State(state.clone()), user.clone(), Json(request("Honda", 2012, 6000)))
            .await
            .unwrap();
        create_vehicle(State(state.clone()), user, Json(request("Toyota", 2022, 25000)))
            .await
            .unwrap();

        let Json(all) = list_vehicles(State(state.clone()), Query(VehicleFilter::default()))
            .await
            .unwrap();
        assert_eq!(all.len(), 3);

        let Json(toyotas) = list_vehicles(
            State(state.clone()),
            Query(VehicleFilter {
                brand: Some("toyota".into()),
                ..Default::default()
            }),
        )
        .await
        .unwrap();
        assert_eq!(toyotas.len(), 2);

        let Json(cheap) = list_vehicles(
            State(state.clone()),
            Query(VehicleFilter {
                max_price: Some(9000),
                ..Default::default()
            }),
        )
        .await
        .unwrap();
        assert_eq!(cheap.len(), 1);
        assert_eq!(cheap[0].brand, "Honda");

        let Json(recent) = list_vehicles(
            State(state),
            Query(VehicleFilter {
                min_year: Some(2015),
                max_year: Some(2023),
                ..Default::default()
            }),
        )
        .await
        .unwrap();
        assert_eq!(recent.len(), 2);
    }

    #[tokio::test]
    async fn save_image_enforces_type_and_size() {
        let dir = tempfile::tempdir().unwrap();

        let url = save_image(dir.path(), "image/png", b"fakepngdata")
            .await
            .unwrap();
        assert!(url.starts_with("/uploads/"));
        assert!(url.ends_with(".png"));
        let stored = dir.path().join(url.trim_start_matches("/uploads/"));
        assert!(stored.exists());

        let err = save_image(dir.path(), "application/pdf", b"data")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Unsupported image type"));

        let big = vec![0u8; MAX_IMAGE_BYTES + 1];
        let err = save_image(dir.path(), "image/jpeg", &big).await.unwrap_err();
        assert!(err.to_string().contains("5 MiB"));

        let err = save_image(dir.path(), "image/jpeg", b"").await.unwrap_err();
        assert!(err.to_string().contains("empty"));
    }

    fn multipart_body(boundary: &str, payload: &[u8]) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; \
                 filename=\"photo.png\"\r\nContent-Type: image/png\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(payload);
        body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
        body
    }

    async fn post_image(state: &Arc<AppState>, token: &str, payload: &[u8]) -> StatusCode {
        use axum::body::Body;
        use axum::http::{header, Request};
        use tower::ServiceExt;

        let request = Request::builder()
            .method("POST")
            .uri("/api/vehicles/v1/images")
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .header(
                header::CONTENT_TYPE,
                "multipart/form-data; boundary=XBOUNDARY",
            )
            .body(Body::from(multipart_body("XBOUNDARY", payload)))
            .unwrap();
        crate::api::create_router(state.clone())
            .oneshot(request)
            .await
            .unwrap()
            .status()
    }

    #[tokio::test]
    async fn upload_route_accepts_files_up_to_the_documented_cap() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_in(dir.path()).await;
        insert_raw_vehicle(&state, "v1").await;
        let token = crate::api::auth::create_session(&state.db, "seller", 7)
            .await
            .unwrap();

        // 3 MiB sits above axum's stock 2 MB body cap but under the per-file
        // limit; the route's body budget must let it through
        let status = post_image(&state, &token, &vec![7u8; 3 * 1024 * 1024]).await;
        assert_eq!(status, StatusCode::OK);

        // Past the per-file limit the route answers 400 from the size check,
        // not a failed body read
        let status = post_image(&state, &token, &vec![7u8; MAX_IMAGE_BYTES + 1]).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let vehicle: Vehicle = sqlx::query_as("SELECT * FROM vehicles WHERE id = 'v1'")
            .fetch_one(&state.db)
            .await
            .unwrap();
        assert_eq!(vehicle.image_urls().len(), 1);
    }

    #[test]
    fn upload_body_budget_exceeds_the_per_file_cap() {
        assert!(MAX_UPLOAD_BODY_BYTES > MAX_IMAGE_BYTES);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn concurrent_image_batches_are_both_kept() {
        let state = state().await;
        insert_raw_vehicle(&state, "v1").await;

        let s1 = state.clone();
        let s2 = state.clone();
        let (a, b) = tokio::join!(
            tokio::spawn(async move {
                append_image_urls(&s1, "v1", &["/uploads/a.png".to_string()]).await
            }),
            tokio::spawn(async move {
                append_image_urls(&s2, "v1", &["/uploads/b.png".to_string()]).await
            }),
        );
        a.unwrap().unwrap();
        b.unwrap().unwrap();

        let vehicle: Vehicle = sqlx::query_as("SELECT * FROM vehicles WHERE id = 'v1'")
            .fetch_one(&state.db)
            .await
            .unwrap();
        let urls = vehicle.image_urls();
        assert_eq!(urls.len(), 2);
        assert!(urls.contains(&"/uploads/a.png".to_string()));
        assert!(urls.contains(&"/uploads/b.png".to_string()));
    }
}

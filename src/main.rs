mod database;
mod error;
mod handlers;
mod middleware;
mod models;
mod pdf;
mod registry;
mod storage;
mod utils;
mod visibility;

use std::{env, sync::Arc};

use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post, put},
    Router,
};
use dotenvy::dotenv;
use tower::ServiceBuilder;
use tower_cookies::CookieManagerLayer;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use database::{create_database_pool, Database};
use storage::{LocalStorage, S3Storage, SharedStorage};

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub storage: SharedStorage,
}

#[tokio::main]
async fn main() {
    // Load environment variables
    dotenv().ok();

    // Initialize logging
    env_logger::init();

    // Initialize database
    let database_url = env::var("DATABASE_URL")
        .expect("DATABASE_URL must be set");

    let db = create_database_pool(&database_url).await
        .expect("Failed to connect to database");

    log::info!("Database connection successful");

    let local_files_dir = env::var("STORAGE_DIR").unwrap_or_else(|_| "storage".to_string());

    let storage: SharedStorage = match env::var("STORAGE_BACKEND").as_deref() {
        Ok("s3") => {
            let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
            let bucket = env::var("S3_BUCKET").expect("S3_BUCKET must be set for the s3 backend");
            let public_base = env::var("S3_PUBLIC_BASE")
                .unwrap_or_else(|_| format!("https://{}.s3.amazonaws.com", bucket));
            log::info!("Using S3 storage bucket {}", bucket);
            Arc::new(S3Storage::new(
                aws_sdk_s3::Client::new(&config),
                bucket,
                public_base,
            ))
        }
        _ => {
            let public_base = env::var("PUBLIC_FILE_BASE")
                .unwrap_or_else(|_| "http://localhost:3000/files".to_string());
            log::info!("Using local storage at {}", local_files_dir);
            Arc::new(LocalStorage::new(local_files_dir.clone(), public_base))
        }
    };

    let state = AppState { db, storage };

    // Build the application router
    let app = create_router(state, &local_files_dir);

    // Get port from environment or use default
    let port = env::var("PORT").unwrap_or_else(|_| "3000".to_string());
    let addr = format!("0.0.0.0:{}", port);

    log::info!("taxdesk server starting on http://{}", addr);

    // Start the server
    let listener = tokio::net::TcpListener::bind(&addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}

fn create_router(state: AppState, local_files_dir: &str) -> Router {
    Router::new()
        // Authentication
        .route("/login", post(handlers::auth::login))
        .route("/logout", post(handlers::auth::logout))

        // Sales records
        .route("/api/sales", get(handlers::sales::list_sales))
        .route("/api/sales", post(handlers::sales::create_sale))
        .route("/api/sales/export", get(handlers::exports::export_sales))
        .route("/api/sales/:id", get(handlers::sales::get_sale))
        .route("/api/sales/:id", put(handlers::sales::update_sale))
        .route("/api/sales/:id", delete(handlers::sales::delete_sale))
        .route("/api/sales/:id/remarks", post(handlers::sales::add_remark))
        .route("/api/sales/:id/attachments", post(handlers::uploads::upload_sales_attachments))
        .route("/api/sales/:id/attachments", delete(handlers::uploads::delete_sales_attachment))

        // Purchase records
        .route("/api/purchases", get(handlers::purchases::list_purchases))
        .route("/api/purchases", post(handlers::purchases::create_purchase))
        .route("/api/purchases/export", get(handlers::exports::export_purchases))
        .route("/api/purchases/:id", get(handlers::purchases::get_purchase))
        .route("/api/purchases/:id", put(handlers::purchases::update_purchase))
        .route("/api/purchases/:id", delete(handlers::purchases::delete_purchase))
        .route("/api/purchases/:id/remarks", post(handlers::purchases::add_remark))
        .route("/api/purchases/:id/attachments", post(handlers::uploads::upload_purchase_attachments))
        .route("/api/purchases/:id/attachments", delete(handlers::uploads::delete_purchase_attachment))

        // Purchase categories
        .route("/api/purchase-categories", get(handlers::purchases::list_categories))
        .route("/api/purchase-categories", post(handlers::purchases::create_category))
        .route("/api/purchase-categories/:id", put(handlers::purchases::update_category))
        .route("/api/purchase-categories/:id", delete(handlers::purchases::delete_category))

        // Taxpayer registry (TIN library)
        .route("/api/taxpayers", get(handlers::taxpayers::list_listings))
        .route("/api/taxpayers", post(handlers::taxpayers::create_listing))
        .route("/api/taxpayers/suggest", get(handlers::taxpayers::suggest_listings))
        .route("/api/taxpayers/:id", put(handlers::taxpayers::update_listing))
        .route("/api/taxpayers/:id", delete(handlers::taxpayers::delete_listing))

        // Commission reports
        .route("/api/commissions", get(handlers::commissions::list_commissions))
        .route("/api/commissions/export", get(handlers::exports::export_commissions))
        .route("/api/commissions/:id", get(handlers::commissions::get_commission))
        .route("/api/commissions/:id", delete(handlers::commissions::delete_commission))
        .route("/api/commissions/:id/status", post(handlers::commissions::update_status))
        .route("/api/commissions/:id/attachments", post(handlers::uploads::upload_commission_attachments))
        .route("/api/commissions/:id/attachments", delete(handlers::uploads::delete_commission_attachment))

        // User management
        .route("/api/users", get(handlers::users::list_users))
        .route("/api/users", post(handlers::users::create_user))
        .route("/api/users/:id", put(handlers::users::update_user))
        .route("/api/users/:id", delete(handlers::users::delete_user))

        // Standalone commission invoice generator
        .route("/dubai-commissions", post(handlers::invoices::dubai_commissions))

        // Locally stored attachments
        .nest_service("/files", ServeDir::new(local_files_dir))

        // Middleware
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CookieManagerLayer::new())
                .layer(CorsLayer::permissive())
                .layer(DefaultBodyLimit::max(25 * 1024 * 1024)) // 25MB
        )
        .with_state(state)
}

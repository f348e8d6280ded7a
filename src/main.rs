use actix_web::{get, post, web, App, HttpResponse, HttpServer, Responder};
use log::{error, info};
use pi1541_browser::app_state::AppState;
use pi1541_browser::config::Config;
use pi1541_browser::csdb::RELEASE_TYPES;
use pi1541_browser::models::FavouriteKind;
use pi1541_browser::petscii::petscii_to_ascii;
use pi1541_browser::remote::PageFetcher;
use pi1541_browser::storage::SqliteStore;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;

type Params = web::Query<HashMap<String, String>>;

fn path_param(query: &HashMap<String, String>) -> String {
    query
        .get("path")
        .filter(|p| !p.is_empty())
        .cloned()
        .unwrap_or_else(|| "/".to_string())
}

fn bad_gateway(message: impl Into<String>) -> HttpResponse {
    HttpResponse::BadGateway().json(serde_json::json!({"error": message.into()}))
}

#[get("/api/tree")]
async fn get_tree(data: web::Data<AppState>) -> impl Responder {
    let tree = data.tree.read().await;
    HttpResponse::Ok().json(serde_json::json!({
        "root": tree.root,
        "mounted_file": tree.mounted_file,
    }))
}

#[get("/api/items")]
async fn get_items(data: web::Data<AppState>, query: Params) -> impl Responder {
    let path = path_param(&query);
    let tree = data.tree.read().await;
    if tree.find_by_path(&path).is_none() {
        return HttpResponse::NotFound().json(serde_json::json!({"error": format!("Directory not found: {}", path)}));
    }
    HttpResponse::Ok().json(serde_json::json!({
        "path": path,
        "loaded": tree.is_directory_loaded(&path),
        "items": tree.listing(&path),
    }))
}

#[post("/api/load")]
async fn load_directory(data: web::Data<AppState>, query: Params) -> impl Responder {
    let path = path_param(&query);
    if data.sync.load_directory_contents(&path).await {
        HttpResponse::Ok().json(serde_json::json!({"path": path, "loaded": true}))
    } else {
        bad_gateway(format!("Failed to load {}", path))
    }
}

#[post("/api/refresh")]
async fn refresh_directories(data: web::Data<AppState>, query: Params) -> impl Responder {
    let path = path_param(&query);
    let data_clone = data.clone();
    actix_web::rt::spawn(async move {
        if data_clone.refresh_directories(&path).await.is_err() {
            error!("Background directory refresh stopped early");
        }
    });
    HttpResponse::Accepted().finish()
}

#[post("/api/details/refresh")]
async fn refresh_details(data: web::Data<AppState>, query: Params) -> impl Responder {
    let path = path_param(&query);
    let data_clone = data.clone();
    actix_web::rt::spawn(async move {
        if data_clone.refresh_details(&path).await.is_err() {
            error!("Background disc detail refresh stopped early");
        }
    });
    HttpResponse::Accepted().finish()
}

#[get("/api/file")]
async fn get_file_details(data: web::Data<AppState>, query: Params) -> impl Responder {
    let Some(path) = query.get("path") else {
        return HttpResponse::BadRequest().json(serde_json::json!({"error": "path is required"}));
    };
    match data.sync.process_file_details(path).await {
        Some(details) => {
            let ascii = details.disc_content.as_deref().map(petscii_to_ascii);
            HttpResponse::Ok().json(serde_json::json!({
                "selected_path": details.selected_path,
                "disc_content": details.disc_content,
                "ascii": ascii,
            }))
        }
        None => bad_gateway("Device unreachable"),
    }
}

#[post("/api/file/load")]
async fn load_file_details(data: web::Data<AppState>, query: Params) -> impl Responder {
    let Some(path) = query.get("path") else {
        return HttpResponse::BadRequest().json(serde_json::json!({"error": "path is required"}));
    };
    match data.sync.load_disc_details(path).await {
        Ok(added) => {
            let tree = data.tree.read().await;
            HttpResponse::Ok().json(serde_json::json!({
                "added": added,
                "file": tree.find_file_by_path(path),
            }))
        }
        Err(e) => bad_gateway(e.to_string()),
    }
}

#[post("/api/mount")]
async fn mount(data: web::Data<AppState>, query: Params) -> impl Responder {
    let Some(path) = query.get("path") else {
        return HttpResponse::BadRequest().json(serde_json::json!({"error": "path is required"}));
    };
    match data.sync.mount_file(path).await {
        Ok(()) => HttpResponse::Ok().json(serde_json::json!({
            "mounted_file": path,
            "stats": data.sync.stats().await,
        })),
        Err(e) => bad_gateway(e.to_string()),
    }
}

#[get("/api/stats")]
async fn get_stats(data: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(data.sync.stats().await)
}

#[post("/api/stats")]
async fn refresh_stats(data: web::Data<AppState>) -> impl Responder {
    match data.sync.process_stats().await {
        Some(stats) => HttpResponse::Ok().json(stats),
        None => bad_gateway("Could not fetch Pi stats"),
    }
}

#[get("/api/status")]
async fn get_status(data: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(data.status_report().await)
}

#[get("/api/search")]
async fn search(data: web::Data<AppState>, query: Params) -> impl Responder {
    let q = query.get("q").map(|s| s.trim()).unwrap_or_default();
    if q.is_empty() {
        return HttpResponse::Ok().json(serde_json::json!({"results": []}));
    }
    let contents = query
        .get("contents")
        .map(|v| v == "true" || v == "1")
        .unwrap_or(false);
    let results = data.tree.read().await.search_all(q, contents);
    HttpResponse::Ok().json(serde_json::json!({
        "query": q,
        "count": results.len(),
        "results": results,
    }))
}

#[post("/api/cache/clear")]
async fn clear_cache(data: web::Data<AppState>) -> impl Responder {
    match data.sync.clear_cache().await {
        Some(_) => HttpResponse::Ok().json(serde_json::json!({"cleared": true, "reloaded": true})),
        None => HttpResponse::Ok().json(serde_json::json!({"cleared": true, "reloaded": false})),
    }
}

#[derive(Deserialize)]
struct FavouriteToggle {
    path: String,
    #[serde(rename = "type")]
    kind: FavouriteKind,
}

#[derive(Deserialize)]
struct DetailFavourite {
    disc_path: String,
    line: String,
}

#[derive(Deserialize)]
struct FavouriteRemove {
    path: String,
}

#[get("/api/favourites")]
async fn list_favourites(data: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(data.favourites.list())
}

#[post("/api/favourites/toggle")]
async fn toggle_favourite(data: web::Data<AppState>, body: web::Json<FavouriteToggle>) -> impl Responder {
    if body.kind == FavouriteKind::Detail {
        return HttpResponse::BadRequest()
            .json(serde_json::json!({"error": "use /api/favourites/detail for content lines"}));
    }
    data.favourites.toggle(&body.path, body.kind);
    HttpResponse::Ok().json(serde_json::json!({
        "path": body.path,
        "favourite": data.favourites.is_favourite(&body.path),
    }))
}

#[post("/api/favourites/detail")]
async fn toggle_detail_favourite(data: web::Data<AppState>, body: web::Json<DetailFavourite>) -> impl Responder {
    data.favourites.toggle_detail(&body.disc_path, &body.line);
    HttpResponse::Ok().json(serde_json::json!({
        "disc_path": body.disc_path,
        "favourite": data.favourites.is_detail_favourite(&body.disc_path, &body.line),
    }))
}

#[post("/api/favourites/remove")]
async fn remove_favourite(data: web::Data<AppState>, body: web::Json<FavouriteRemove>) -> impl Responder {
    data.favourites.remove(&body.path);
    HttpResponse::Ok().json(data.favourites.list())
}

#[post("/api/favourites/detail/remove")]
async fn remove_detail_favourite(data: web::Data<AppState>, body: web::Json<DetailFavourite>) -> impl Responder {
    data.favourites.remove_detail(&body.disc_path, &body.line);
    HttpResponse::Ok().json(data.favourites.list())
}

#[derive(Deserialize)]
struct SettingsUpdate {
    pi_endpoint: Option<String>,
    csdb_endpoint: Option<String>,
}

#[get("/api/settings")]
async fn get_settings(data: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(data.settings.current().await)
}

#[post("/api/settings")]
async fn update_settings(data: web::Data<AppState>, body: web::Json<SettingsUpdate>) -> impl Responder {
    if let Some(url) = body.pi_endpoint.as_deref().filter(|u| !u.trim().is_empty()) {
        data.settings.set_pi_endpoint(url.trim()).await;
    }
    if let Some(url) = body.csdb_endpoint.as_deref().filter(|u| !u.trim().is_empty()) {
        data.settings.set_csdb_endpoint(url.trim()).await;
    }
    HttpResponse::Ok().json(data.settings.current().await)
}

#[get("/api/csdb")]
async fn csdb_state(data: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(data.csdb.state().await)
}

#[get("/api/csdb/types")]
async fn csdb_release_types() -> impl Responder {
    HttpResponse::Ok().json(RELEASE_TYPES)
}

#[post("/api/csdb/search")]
async fn csdb_search(data: web::Data<AppState>, query: Params) -> impl Responder {
    let q = query.get("q").cloned().unwrap_or_default();
    data.csdb.search_quick(&q).await;
    HttpResponse::Ok().json(data.csdb.state().await)
}

#[post("/api/csdb/group")]
async fn csdb_group(data: web::Data<AppState>, query: Params) -> impl Responder {
    let name = query.get("name").cloned().unwrap_or_default();
    data.csdb.search_group(&name).await;
    HttpResponse::Ok().json(data.csdb.state().await)
}

#[post("/api/csdb/toplist/{subtype}")]
async fn csdb_toplist(data: web::Data<AppState>, subtype: web::Path<u32>) -> impl Responder {
    data.csdb.search_toplist(subtype.into_inner()).await;
    HttpResponse::Ok().json(data.csdb.state().await)
}

#[get("/api/csdb/release/{id}")]
async fn csdb_release(data: web::Data<AppState>, id: web::Path<u64>) -> impl Responder {
    let id = id.into_inner();
    match data.csdb.fetch_release_details(id).await {
        Some(detail) => HttpResponse::Ok().json(detail),
        None => bad_gateway(format!("Could not fetch release {}", id)),
    }
}

#[get("/api/toasts")]
async fn drain_toasts(data: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(data.toasts.drain())
}

/// log4rs from `log4rs.yml`, or plain console logging when the file is missing.
fn init_logging() {
    if let Err(e) = log4rs::init_file("log4rs.yml", Default::default()) {
        use log4rs::append::console::ConsoleAppender;
        use log4rs::config::{Appender, Root};
        use log4rs::encode::pattern::PatternEncoder;

        let stdout = ConsoleAppender::builder()
            .encoder(Box::new(PatternEncoder::new("{d(%Y-%m-%d %H:%M:%S)} {h({l})} {t} - {m}{n}")))
            .build();
        let config = log4rs::config::Config::builder()
            .appender(Appender::builder().build("stdout", Box::new(stdout)))
            .build(Root::builder().appender("stdout").build(log::LevelFilter::Info));
        match config {
            Ok(config) => {
                if let Err(init_err) = log4rs::init_config(config) {
                    eprintln!("Failed to initialise logging: {}", init_err);
                    return;
                }
                log::warn!("log4rs.yml not loaded ({}), logging to console", e);
            }
            Err(config_err) => eprintln!("Failed to build logging config: {}", config_err),
        }
    }
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    init_logging();

    let cfg = Config::load();

    let store = match SqliteStore::open(&cfg.database_path) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            error!("Failed to open {}: {}", cfg.database_path, e);
            return Err(std::io::Error::new(std::io::ErrorKind::Other, e.to_string()));
        }
    };

    let fetcher: Arc<dyn PageFetcher> = match cfg.http.create_http_client() {
        Ok(client) => Arc::new(client),
        Err(e) => {
            error!("Failed to create HTTP client: {}", e);
            return Err(std::io::Error::new(std::io::ErrorKind::Other, e.to_string()));
        }
    };

    info!("Proxy HTTP client initialized:");
    info!("  Max retries: {}", cfg.http.max_retries);
    match cfg.http.timeout_secs {
        Some(secs) => info!("  Timeout: {}s", secs),
        None => info!("  Timeout: none"),
    }

    let bind_address = cfg.bind_address.clone();
    let data = web::Data::new(AppState::build(cfg, store, fetcher).await);

    let restore_data = data.clone();
    actix_web::rt::spawn(async move {
        restore_data.restore_content().await;
        if !restore_data.tree.read().await.root.loaded {
            info!("No cached tree, loading root index");
            restore_data.sync.process_index("").await;
        }
    });

    info!("Listening on {}", bind_address);
    HttpServer::new(move || {
        App::new()
            .app_data(data.clone())
            .service(get_tree)
            .service(get_items)
            .service(load_directory)
            .service(refresh_directories)
            .service(refresh_details)
            .service(get_file_details)
            .service(load_file_details)
            .service(mount)
            .service(get_stats)
            .service(refresh_stats)
            .service(get_status)
            .service(search)
            .service(clear_cache)
            .service(list_favourites)
            .service(toggle_favourite)
            .service(toggle_detail_favourite)
            .service(remove_favourite)
            .service(remove_detail_favourite)
            .service(get_settings)
            .service(update_settings)
            .service(csdb_state)
            .service(csdb_release_types)
            .service(csdb_search)
            .service(csdb_group)
            .service(csdb_toplist)
            .service(csdb_release)
            .service(drain_toasts)
    })
    .bind(bind_address)?
    .run()
    .await
}

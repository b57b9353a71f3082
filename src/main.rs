#[macro_use]
extern crate diesel;
extern crate dotenv;

pub mod app;
pub mod database;
pub mod schema;

mod auth;
mod routes;

use actix_web::{App, HttpServer};
use app::AppState;
use routes::{admin::*, auth::*, categories::*, comments::*, posts::*, tags::*};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init();

    let app_state = AppState::new(None);
    let bind_addr =
        std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string());

    log::info!("Server running on {}", bind_addr);
    HttpServer::new(move || {
        App::new()
            .app_data(actix_web::web::Data::new(app_state.clone()))
            //Auth routes
            .service(register)
            .service(login)
            .service(logout)
            .service(me)
            .service(update_profile)
            //Post routes
            .service(list_posts)
            .service(get_post)
            .service(create_post)
            .service(update_post)
            .service(delete_post)
            .service(track_view)
            .service(toggle_like)
            .service(like_status)
            //Comment routes
            .service(list_comments)
            .service(create_comment)
            .service(delete_comment)
            //Category and tag routes
            .service(list_categories)
            .service(create_category)
            .service(update_category)
            .service(delete_category)
            .service(list_tags)
            .service(delete_tag)
            //Admin routes
            .service(global_analytics)
            .service(dashboard)
            .service(list_users)
            .service(create_admin)
            .service(delete_user)
            .service(audit_log)
    })
    .bind(bind_addr)?
    .run()
    .await
}

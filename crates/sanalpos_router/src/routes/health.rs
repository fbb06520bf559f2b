use actix_web::HttpResponse;

pub async fn health() -> HttpResponse {
    tracing::debug!("health was called");
    HttpResponse::Ok().body("health is good")
}

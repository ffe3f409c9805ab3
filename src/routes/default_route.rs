use actix_web::{get, HttpResponse, Responder};

#[get("/")]
async fn default() -> impl Responder {
    HttpResponse::Ok().body("seeker is up. POST /search/{jobs,internships,colleges} to search.")
}

use std::net::TcpListener;

use actix_web::{
    dev::Server,
    error::InternalError,
    middleware::Logger,
    web::{self, Data},
    App, HttpResponse, HttpServer,
};
use serde_json::json;

use crate::{
    routes::{default_route, results_route, search_route},
    services::SearchOrchestrator,
};

pub fn run(
    listener: TcpListener,
    orchestrator: Data<SearchOrchestrator>,
) -> Result<Server, std::io::Error> {
    let server = HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .app_data(web::JsonConfig::default().error_handler(|err, _req| {
                let response =
                    HttpResponse::BadRequest().json(json!({ "error": err.to_string() }));
                InternalError::from_response(err, response).into()
            }))
            .service(default_route::default)
            .service(
                web::scope("/search")
                    .service(search_route::search_jobs)
                    .service(search_route::search_internships)
                    .service(search_route::search_colleges),
            )
            .service(web::scope("/results").service(results_route::saved_results))
            .app_data(orchestrator.clone())
    })
    .listen(listener)?
    .run();

    Ok(server)
}

use crate::{
    api::{business, leave},
    auth::{handlers, middleware::auth_middleware},
    billing::{subscription, webhook},
    config::Config,
    notification::handlers as notifications,
};
use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::{middleware::from_fn, web};
use std::sync::Arc;

pub fn configure(cfg: &mut web::ServiceConfig, config: Config) {
    // Helper to build per-route limiter
    fn build_limiter(requests_per_min: u32) -> Governor<PeerIpKeyExtractor, NoOpMiddleware> {
        let per_ms = if requests_per_min == 0 {
            1
        } else {
            60_000 / requests_per_min as u64
        };
        let cfg = GovernorConfigBuilder::default()
            .per_millisecond(per_ms)
            .burst_size(requests_per_min)
            .key_extractor(PeerIpKeyExtractor)
            .finish()
            .unwrap();
        Governor::new(&cfg)
    }

    let login_limiter = Arc::new(build_limiter(config.rate_login_per_min));
    let register_limiter = Arc::new(build_limiter(config.rate_register_per_min));
    let refresh_limiter = Arc::new(build_limiter(config.rate_refresh_per_min));
    let webhook_limiter = Arc::new(build_limiter(config.rate_webhook_per_min));
    let protected_limiter = Arc::new(build_limiter(config.rate_protected_per_min));

    // Public routes
    cfg.service(
        web::scope("/auth")
            .service(
                web::resource("/login")
                    .wrap(login_limiter.clone())
                    .route(web::post().to(handlers::login)),
            )
            .service(
                web::resource("/register")
                    .wrap(register_limiter.clone())
                    .route(web::post().to(handlers::register)),
            )
            .service(
                web::resource("/refresh")
                    .wrap(refresh_limiter.clone())
                    .route(web::post().to(handlers::refresh_token)),
            )
            .service(
                web::resource("/logout")
                    .wrap(login_limiter.clone())
                    .route(web::post().to(handlers::logout)),
            ),
    );

    // Stripe posts here with its own signature, no session
    cfg.service(
        web::resource("/stripe/webhooks")
            .wrap(webhook_limiter)
            .route(web::post().to(webhook::stripe_webhook)),
    );

    // Protected routes
    cfg.service(
        web::scope(&config.api_prefix)
            .wrap(from_fn(auth_middleware))
            // authentication
            .wrap(protected_limiter) // rate limiting
            .service(
                web::scope("/leave")
                    // /leave
                    .service(
                        web::resource("")
                            .route(web::get().to(leave::leave_list))
                            .route(web::post().to(leave::create_leave)),
                    )
                    // literal segments before the {id} matcher
                    .service(
                        web::resource("/approvals")
                            .route(web::get().to(leave::pending_approvals)),
                    )
                    .service(
                        web::resource("/calendar").route(web::get().to(leave::leave_calendar)),
                    )
                    .service(web::resource("/reports").route(web::get().to(leave::leave_reports)))
                    // /leave/{id}
                    .service(web::resource("/{id}").route(web::get().to(leave::get_leave)))
                    // /leave/{id}/decision
                    .service(
                        web::resource("/{id}/decision")
                            .route(web::post().to(leave::decide_leave)),
                    ),
            )
            .service(
                web::scope("/notifications")
                    // /notifications
                    .service(
                        web::resource("")
                            .route(web::get().to(notifications::list_notifications))
                            .route(web::post().to(notifications::create_notification)),
                    )
                    .service(
                        web::resource("/unread-count")
                            .route(web::get().to(notifications::unread_count)),
                    )
                    .service(
                        web::resource("/mark-all-read")
                            .route(web::post().to(notifications::mark_all_read)),
                    )
                    .service(
                        web::resource("/preferences")
                            .route(web::get().to(notifications::get_preferences))
                            .route(web::put().to(notifications::update_preferences)),
                    )
                    // /notifications/{id}
                    .service(
                        web::resource("/{id}")
                            .route(web::delete().to(notifications::delete_notification)),
                    )
                    .service(
                        web::resource("/{id}/read")
                            .route(web::post().to(notifications::mark_read)),
                    ),
            )
            .service(
                web::scope("/billing")
                    .service(
                        web::resource("/subscription")
                            .route(web::get().to(subscription::get_subscription)),
                    )
                    .service(
                        web::resource("/trial").route(web::post().to(subscription::start_trial)),
                    )
                    .service(
                        web::resource("/invoices")
                            .route(web::get().to(subscription::list_invoices)),
                    ),
            )
            .service(
                web::scope("/business").service(
                    web::resource("/config")
                        .route(web::get().to(business::get_config))
                        .route(web::put().to(business::update_config)),
                ),
            ),
    );
}

// LOGIN
//  ├─ access_token (15 min)
//  └─ refresh_token (7 days)

// API REQUEST
//  └─ Authorization: Bearer access_token

// ACCESS EXPIRED
//  └─ POST /refresh with refresh_token
//       └─ returns new access_token

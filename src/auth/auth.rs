use crate::config::Config;
use crate::{
    model::role::Role,
    models::{Claims, TokenType},
};
use actix_web::{FromRequest, HttpRequest, dev::Payload, error::ErrorUnauthorized, web::Data};
use futures::future::{Ready, ready};
use jsonwebtoken::decode;
use jsonwebtoken::{DecodingKey, Validation};

pub struct AuthUser {
    pub user_id: u64,
    pub email: String,
    pub role: Role,
    pub business_id: String,
    pub department: Option<String>,
}

impl FromRequest for AuthUser {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let token = match req
            .headers()
            .get("Authorization")
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer "))
        {
            Some(t) => t,
            None => return ready(Err(ErrorUnauthorized("Missing token"))),
        };

        let config = match req.app_data::<Data<Config>>() {
            Some(c) => c,
            None => {
                return ready(Err(actix_web::error::ErrorInternalServerError(
                    "Config missing",
                )));
            }
        };

        let data = match decode::<Claims>(
            token,
            &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            &Validation::default(),
        ) {
            Ok(d) => d,
            Err(_) => return ready(Err(ErrorUnauthorized("Invalid token"))),
        };

        if data.claims.token_type != TokenType::Access {
            return ready(Err(ErrorUnauthorized("Access token required")));
        }

        let role = match Role::from_id(data.claims.role) {
            Some(r) => r,
            None => return ready(Err(ErrorUnauthorized("Invalid role"))),
        };

        ready(Ok(AuthUser {
            user_id: data.claims.user_id,
            email: data.claims.sub,
            role,
            business_id: data.claims.business_id,
            department: data.claims.department,
        }))
    }
}

impl AuthUser {
    /// Leave decisions are restricted to SUPERVISOR, HR and DIRECTOR.
    pub fn require_approver(&self) -> actix_web::Result<()> {
        if self.role.can_approve() {
            Ok(())
        } else {
            Err(actix_web::error::ErrorForbidden("Approver role required"))
        }
    }

    pub fn require_hr_or_director(&self) -> actix_web::Result<()> {
        if matches!(self.role, Role::Hr | Role::Director) {
            Ok(())
        } else {
            Err(actix_web::error::ErrorForbidden("HR/Director only"))
        }
    }

    pub fn is_employee(&self) -> bool {
        self.role == Role::Employee
    }
}

use actix_web::{get, post, web, HttpRequest, HttpResponse};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{Duration, NaiveDate, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use log::{error, info};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::models::member::{MemberProfile, MemberRecord, Role, Viewer};
use crate::roles::helpers::{insert_member, insert_specialization, NewMember, Specialization};
use crate::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub member: MemberProfile,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterRequest {
    #[serde(flatten)]
    pub member: NewMember,
    pub role: String,
    pub birthday: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Claims {
    pub sub: String,   // member id
    pub email: String,
    pub role: Role,
    pub exp: usize,    // expiration time
}

impl Claims {
    pub fn viewer(&self) -> Result<Viewer, ApiError> {
        let member_id = self
            .sub
            .parse::<i32>()
            .map_err(|_| ApiError::Unauthenticated("Invalid token subject".to_string()))?;
        Ok(Viewer {
            member_id,
            role: self.role,
        })
    }
}

// ============================================================================
// Password hashing
// ============================================================================

pub fn hash_password(plain: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ApiError::Internal(format!("Failed to hash password: {}", e)))
}

pub fn verify_password(plain: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(plain.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            error!("Failed to parse password hash: {}", e);
            false
        }
    }
}

/// A missing member and a wrong password are indistinguishable to the caller.
pub fn check_credentials(
    member: Option<MemberRecord>,
    plain_password: &str,
) -> Result<MemberRecord, ApiError> {
    match member {
        Some(member) if verify_password(plain_password, &member.password_hash) => Ok(member),
        _ => Err(ApiError::InvalidCredentials),
    }
}

// ============================================================================
// Tokens
// ============================================================================

pub fn issue_token(
    member: &MemberRecord,
    secret: &str,
    ttl_minutes: i64,
) -> Result<String, ApiError> {
    let expiration = Utc::now()
        .checked_add_signed(Duration::minutes(ttl_minutes))
        .ok_or_else(|| ApiError::Internal("Token expiry overflow".to_string()))?
        .timestamp() as usize;

    let claims = Claims {
        sub: member.id.to_string(),
        email: member.email.clone(),
        role: member.role,
        exp: expiration,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_ref()),
    )
    .map_err(|e| ApiError::Internal(format!("JWT encoding error: {}", e)))
}

pub fn decode_token(token: &str, secret: &str) -> Result<Claims, ApiError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_ref()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|_| ApiError::Unauthenticated("Invalid token".to_string()))
}

/// Extract and validate the bearer token from the request.
pub fn verify_token(req: &HttpRequest, app_state: &AppState) -> Result<Claims, ApiError> {
    let header = req
        .headers()
        .get("Authorization")
        .ok_or_else(|| ApiError::Unauthenticated("Missing authorization header".to_string()))?;

    let header_str = header.to_str().unwrap_or("");
    let token = header_str
        .strip_prefix("Bearer ")
        .ok_or_else(|| ApiError::Unauthenticated("Invalid authorization header".to_string()))?;

    decode_token(token.trim(), &app_state.jwt_secret)
}

pub fn authenticate(req: &HttpRequest, app_state: &AppState) -> Result<Viewer, ApiError> {
    verify_token(req, app_state)?.viewer()
}

// ============================================================================
// Routes
// ============================================================================

#[post("/register")]
async fn register(
    app_state: web::Data<AppState>,
    payload: web::Json<RegisterRequest>,
) -> Result<HttpResponse, ApiError> {
    let payload = payload.into_inner();

    // Resolve the role before touching the database so nothing is written
    // for an unknown role.
    let role: Role = payload.role.parse()?;
    payload.member.validate()?;

    let specialization = match role {
        Role::Teacher => Specialization::Teacher,
        Role::Student => Specialization::Student {
            birthday: payload.birthday,
            group_id: None,
        },
        Role::Parent => Specialization::Parent {
            parent_type_id: None,
        },
    };

    let mut tx = app_state.db.begin().await?;
    let member = insert_member(&mut tx, &payload.member, role).await?;
    insert_specialization(&mut tx, member.id, &specialization).await?;
    tx.commit().await?;

    info!("Registered member {} as {}", member.id, role);

    Ok(HttpResponse::Created()
        .insert_header(("Location", format!("/api/members/{}", member.id)))
        .json(MemberProfile::from(member)))
}

#[post("/login")]
async fn login(
    app_state: web::Data<AppState>,
    credentials: web::Json<LoginRequest>,
) -> Result<HttpResponse, ApiError> {
    let member = sqlx::query_as::<_, MemberRecord>(
        "SELECT id, surname, name, phone, email, password_hash, role, created_at, updated_at
         FROM members WHERE email = $1",
    )
    .bind(crate::models::member::normalize_email(&credentials.email))
    .fetch_optional(&app_state.db)
    .await?;

    let member = check_credentials(member, &credentials.password)?;
    let token = issue_token(&member, &app_state.jwt_secret, app_state.token_ttl_minutes)?;

    Ok(HttpResponse::Ok().json(LoginResponse {
        token,
        member: member.into(),
    }))
}

#[get("/me")]
async fn me(req: HttpRequest, app_state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let viewer = authenticate(&req, &app_state)?;

    let profile = sqlx::query_as::<_, MemberProfile>(
        "SELECT id, surname, name, phone, email, role, created_at, updated_at
         FROM members WHERE id = $1",
    )
    .bind(viewer.member_id)
    .fetch_optional(&app_state.db)
    .await?
    .ok_or_else(|| ApiError::NotFound("Member".to_string()))?;

    Ok(HttpResponse::Ok().json(profile))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/auth")
            .service(register)
            .service(login)
            .service(me),
    );
}

/// User Routes
///
/// Tenant-scoped user administration and the caller's own profile.
/// Role requirements are attached to the resources in `routes::configure`.

use actix_web::{web, HttpResponse};
use serde_json::json;

use crate::auth::Identity;
use crate::error::AppError;
use crate::users::service::{
    ChangePasswordRequest, CreateUserRequest, ListUsersQuery, UpdateProfileRequest,
    UpdateUserRequest,
};
use crate::users::UserService;
use crate::validators::{
    validate_change_password, validate_create_user, validate_list_query,
    validate_update_profile, validate_update_user,
};

/// POST /users (admin)
pub async fn create_user(
    identity: web::ReqData<Identity>,
    body: web::Json<CreateUserRequest>,
    users: web::Data<UserService>,
) -> Result<HttpResponse, AppError> {
    let mut request = body.into_inner();
    validate_create_user(&mut request)?;

    let user = users.create(&identity, request).await?;

    Ok(HttpResponse::Created().json(json!({
        "success": true,
        "message": "User created",
        "user": user,
    })))
}

/// GET /users (admin)
pub async fn list_users(
    identity: web::ReqData<Identity>,
    query: web::Query<ListUsersQuery>,
    users: web::Data<UserService>,
) -> Result<HttpResponse, AppError> {
    let filter = validate_list_query(query.into_inner())?;

    let page = users.list(&identity, &filter).await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "users": page.users,
        "pagination": page.pagination,
    })))
}

/// GET /users/profile
pub async fn get_profile(
    identity: web::ReqData<Identity>,
    users: web::Data<UserService>,
) -> Result<HttpResponse, AppError> {
    let user = users.profile(&identity).await?;

    Ok(HttpResponse::Ok().json(json!({ "success": true, "user": user })))
}

/// PUT /users/profile
pub async fn update_profile(
    identity: web::ReqData<Identity>,
    body: web::Json<UpdateProfileRequest>,
    users: web::Data<UserService>,
) -> Result<HttpResponse, AppError> {
    let mut request = body.into_inner();
    validate_update_profile(&mut request)?;

    let user = users.update_profile(&identity, request).await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Profile updated",
        "user": user,
    })))
}

/// GET /users/{id}
///
/// 404 for users of other stores as well as missing ones.
pub async fn get_user(
    identity: web::ReqData<Identity>,
    path: web::Path<i64>,
    users: web::Data<UserService>,
) -> Result<HttpResponse, AppError> {
    let user = users.get(&identity, path.into_inner()).await?;

    Ok(HttpResponse::Ok().json(json!({ "success": true, "user": user })))
}

/// PUT /users/{id}
pub async fn update_user(
    identity: web::ReqData<Identity>,
    path: web::Path<i64>,
    body: web::Json<UpdateUserRequest>,
    users: web::Data<UserService>,
) -> Result<HttpResponse, AppError> {
    let mut request = body.into_inner();
    validate_update_user(&mut request)?;

    let user = users.update(&identity, path.into_inner(), request).await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "User updated",
        "user": user,
    })))
}

/// PATCH /users/{id}/change-password
pub async fn change_password(
    identity: web::ReqData<Identity>,
    path: web::Path<i64>,
    body: web::Json<ChangePasswordRequest>,
    users: web::Data<UserService>,
) -> Result<HttpResponse, AppError> {
    let request = body.into_inner();
    validate_change_password(&request)?;

    users
        .change_password(&identity, path.into_inner(), request)
        .await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Password changed, please log in again",
    })))
}

/// DELETE /users/{id} (admin)
pub async fn delete_user(
    identity: web::ReqData<Identity>,
    path: web::Path<i64>,
    users: web::Data<UserService>,
) -> Result<HttpResponse, AppError> {
    users.delete(&identity, path.into_inner()).await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "User deleted",
    })))
}

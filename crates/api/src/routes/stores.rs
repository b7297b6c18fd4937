//! Shopify store connections (`manage_stores`).
//!
//! Admins see every store; managers only the stores they manage. Access
//! tokens are write-only.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use stockmirror_core::{Permission, Role, ShopDomain, StoreId, UserId};

use crate::db::StoreRepository;
use crate::error::AppError;
use crate::middleware::CurrentUser;
use crate::models::store::{NewStore, Store, StoreChanges};
use crate::shopify::{Location, Shop};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateStoreRequest {
    pub name: String,
    pub shopify_domain: String,
    pub access_token: String,
    pub location_id: Option<i64>,
    pub manager_id: Option<UserId>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStoreRequest {
    pub name: Option<String>,
    pub shopify_domain: Option<String>,
    pub access_token: Option<String>,
    pub location_id: Option<i64>,
    pub manager_id: Option<UserId>,
}

/// Result of `POST /api/stores/{id}/test`.
#[derive(Debug, Serialize)]
pub struct ConnectionTest {
    pub connected: bool,
    pub shop: Option<Shop>,
    pub error: Option<String>,
}

fn parse_domain(raw: &str) -> Result<ShopDomain, AppError> {
    ShopDomain::parse(raw).map_err(|e| AppError::BadRequest(e.to_string()))
}

fn parse_token(raw: &str) -> Result<SecretString, AppError> {
    let token = raw.trim();
    if token.is_empty() {
        return Err(AppError::BadRequest("access_token is required".to_string()));
    }
    Ok(SecretString::from(token.to_string()))
}

/// Manager whose stores bound the caller's reach; `None` for admins.
pub(crate) fn managed_scope(current: &CurrentUser) -> Option<UserId> {
    (current.role() != Role::Admin).then(|| current.id())
}

fn can_access(current: &CurrentUser, store: &Store) -> bool {
    managed_scope(current).is_none_or(|id| store.manager_id == Some(id))
}

/// Load a store the caller may act on; others' stores look absent.
async fn load(state: &AppState, current: &CurrentUser, id: StoreId) -> Result<Store, AppError> {
    current.require(Permission::ManageStores)?;
    StoreRepository::new(state.pool())
        .get_by_id(id)
        .await?
        .filter(|store| can_access(current, store))
        .ok_or_else(|| AppError::NotFound(format!("store {id}")))
}

/// `GET /api/stores`
pub async fn list(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<Json<Vec<Store>>, AppError> {
    current.require(Permission::ManageStores)?;
    let manager = managed_scope(&current);
    Ok(Json(StoreRepository::new(state.pool()).list(manager).await?))
}

/// `POST /api/stores`
pub async fn create(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(req): Json<CreateStoreRequest>,
) -> Result<(StatusCode, Json<Store>), AppError> {
    current.require(Permission::ManageStores)?;

    let name = req.name.trim().to_string();
    if name.is_empty() {
        return Err(AppError::BadRequest("name is required".to_string()));
    }
    // Non-admins always manage the stores they add.
    let manager_id = if current.role() == Role::Admin {
        req.manager_id
    } else {
        Some(current.id())
    };

    let store = StoreRepository::new(state.pool())
        .create(&NewStore {
            name,
            shopify_domain: parse_domain(&req.shopify_domain)?,
            access_token: parse_token(&req.access_token)?,
            location_id: req.location_id,
            manager_id,
        })
        .await?;

    info!(store_id = %store.id, domain = %store.shopify_domain, user_id = %current.id(), "Store added");
    Ok((StatusCode::CREATED, Json(store)))
}

/// `GET /api/stores/{id}`
pub async fn show(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<StoreId>,
) -> Result<Json<Store>, AppError> {
    Ok(Json(load(&state, &current, id).await?))
}

/// `PUT /api/stores/{id}`
pub async fn update(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<StoreId>,
    Json(req): Json<UpdateStoreRequest>,
) -> Result<Json<Store>, AppError> {
    load(&state, &current, id).await?;

    let name = req.name.map(|n| n.trim().to_string());
    if name.as_deref() == Some("") {
        return Err(AppError::BadRequest("name must not be empty".to_string()));
    }
    let changes = StoreChanges {
        name,
        shopify_domain: req.shopify_domain.as_deref().map(parse_domain).transpose()?,
        access_token: req.access_token.as_deref().map(parse_token).transpose()?,
        location_id: req.location_id,
        manager_id: if current.role() == Role::Admin {
            req.manager_id
        } else {
            None
        },
    };

    let store = StoreRepository::new(state.pool()).update(id, &changes).await?;
    state.shopify().invalidate(id).await;

    info!(store_id = %id, user_id = %current.id(), "Store updated");
    Ok(Json(store))
}

/// `DELETE /api/stores/{id}`
pub async fn delete(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<StoreId>,
) -> Result<StatusCode, AppError> {
    load(&state, &current, id).await?;
    StoreRepository::new(state.pool()).delete(id).await?;
    state.shopify().invalidate(id).await;

    info!(store_id = %id, user_id = %current.id(), "Store removed");
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /api/stores/{id}/test`: fetch `shop.json` and record the outcome.
pub async fn test_connection(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<StoreId>,
) -> Result<Json<ConnectionTest>, AppError> {
    let store = load(&state, &current, id).await?;
    let client = state.shopify().client_for(&store).await;

    let result = match client.shop().await {
        Ok(shop) => {
            info!(store_id = %id, shop = %shop.name, "Store connection verified");
            ConnectionTest {
                connected: true,
                shop: Some(shop),
                error: None,
            }
        }
        Err(e) => {
            warn!(store_id = %id, error = %e, "Store connection test failed");
            ConnectionTest {
                connected: false,
                shop: None,
                error: Some(e.to_string()),
            }
        }
    };

    StoreRepository::new(state.pool())
        .set_connected(id, result.connected)
        .await?;
    Ok(Json(result))
}

/// `GET /api/stores/{id}/locations`
pub async fn locations(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<StoreId>,
) -> Result<Json<Vec<Location>>, AppError> {
    let store = load(&state, &current, id).await?;
    let client = state.shopify().client_for(&store).await;
    Ok(Json(client.locations().await?))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use secrecy::ExposeSecret;

    use super::*;
    use crate::models::user::User;

    fn current(id: i32, role: Role) -> CurrentUser {
        CurrentUser(User {
            id: UserId::new(id),
            username: format!("user{id}"),
            email: None,
            role,
            permissions: vec![],
            is_active: true,
            created_by: None,
            last_login_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        })
    }

    fn store(manager_id: Option<i32>) -> Store {
        Store {
            id: StoreId::new(1),
            name: "Main".to_string(),
            shopify_domain: ShopDomain::parse("main-shop").unwrap(),
            access_token: SecretString::from("shpat_x"),
            location_id: None,
            connected: false,
            last_connected_at: None,
            manager_id: manager_id.map(UserId::new),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_managers_only_reach_their_stores() {
        assert!(can_access(&current(2, Role::Manager), &store(Some(2))));
        assert!(!can_access(&current(2, Role::Manager), &store(Some(5))));
        assert!(!can_access(&current(2, Role::Manager), &store(None)));
        assert!(can_access(&current(1, Role::Admin), &store(None)));
    }

    #[test]
    fn test_scope_follows_role() {
        assert_eq!(managed_scope(&current(1, Role::Admin)), None);
        assert_eq!(
            managed_scope(&current(2, Role::Manager)),
            Some(UserId::new(2))
        );
        // Staff granted manage_stores still only reach stores they manage.
        assert_eq!(managed_scope(&current(3, Role::Staff)), Some(UserId::new(3)));
    }

    #[test]
    fn test_input_parsing() {
        assert_eq!(
            parse_domain("https://Main-Shop.myshopify.com/").unwrap().as_str(),
            "main-shop.myshopify.com"
        );
        assert!(parse_domain("not a domain").is_err());
        assert_eq!(parse_token(" shpat_1 ").unwrap().expose_secret(), "shpat_1");
        assert!(parse_token("   ").is_err());
    }

    #[test]
    fn test_store_json_omits_token() {
        let json = serde_json::to_value(store(None)).unwrap();
        assert!(json.get("access_token").is_none());
        assert_eq!(json["shopify_domain"], "main-shop.myshopify.com");
    }
}

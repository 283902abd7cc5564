#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header::SET_COOKIE, Request, Response},
    Router,
};
use reunite::{
    api::{router, AppState},
    auth::{AuthGate, CapabilityLookup},
    broker::CodeBroker,
    keys::Keypair,
    lookup::{CollarDirectory, CollarInfo, CollarLookupFlow, CollarRecord, DEFAULT_CODE_TTL},
    token::{TokenService, TokenTtls},
};
use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

pub const ADMIN: &str = "operator@reunite.pet";
pub const OWNER_PHONE: &str = "+15550100";

pub struct MemoryDirectory(HashMap<String, CollarRecord>);

#[async_trait]
impl CollarDirectory for MemoryDirectory {
    async fn find_registered(&self, tag_id: &str) -> anyhow::Result<Option<CollarRecord>> {
        Ok(self.0.get(tag_id).cloned())
    }
}

pub struct StaticAdmins(HashSet<String>);

#[async_trait]
impl CapabilityLookup for StaticAdmins {
    async fn is_admin(&self, subject: &str) -> anyhow::Result<bool> {
        Ok(self.0.contains(subject))
    }
}

pub struct TestApp {
    pub router: Router,
    pub tokens: Arc<TokenService>,
    pub broker: Arc<CodeBroker>,
}

pub fn collar(tag_id: &str) -> CollarRecord {
    CollarRecord {
        info: CollarInfo {
            tag_id: tag_id.to_string(),
            pet_name: "Koshka".to_string(),
            pet_image: None,
            pet_dob: Some("2019-04-01".to_string()),
            neutered: true,
            vaccinated: true,
        },
        contact_phone: OWNER_PHONE.to_string(),
    }
}

pub fn app_with_width(width: u32) -> TestApp {
    let tokens = Arc::new(TokenService::new(Keypair::generate(), TokenTtls::default()));
    let broker = Arc::new(CodeBroker::new(width));

    let directory: HashMap<String, CollarRecord> = ["TAG-1", "TAG-2"]
        .into_iter()
        .map(|tag| (tag.to_string(), collar(tag)))
        .collect();
    let admins = StaticAdmins([ADMIN.to_string()].into_iter().collect());

    let state = AppState {
        gate: Arc::new(AuthGate::new(tokens.clone(), Arc::new(admins))),
        lookup: Arc::new(CollarLookupFlow::new(
            Arc::new(MemoryDirectory(directory)),
            broker.clone(),
            DEFAULT_CODE_TTL,
        )),
    };

    TestApp {
        router: router(state),
        tokens,
        broker,
    }
}

pub fn app() -> TestApp {
    app_with_width(5)
}

pub fn get(uri: &str, headers: &[(&str, String)]) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    for (name, value) in headers {
        builder = builder.header(*name, value.as_str());
    }
    builder.body(Body::empty()).expect("request")
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body")
        .to_vec()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).expect("json body")
}

/// Value of the named cookie among the response's `Set-Cookie` headers.
pub fn set_cookie(response: &Response<Body>, name: &str) -> Option<String> {
    response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find_map(|cookie| {
            let (pair, _) = cookie.split_once(';')?;
            let (key, value) = pair.split_once('=')?;
            (key == name).then(|| value.to_string())
        })
}

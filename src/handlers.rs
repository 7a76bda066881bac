//! Application handlers.

use async_trait::async_trait;
use http::StatusCode;
use serde::Serialize;

use crate::core::{Context, Request, Response, Result};
use crate::server::Handler;

#[derive(Debug, Serialize)]
pub struct HealthData {
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct Championship {
    pub name: &'static str,
    pub title: &'static str,
    pub country: &'static str,
}

/// `GET /health`
pub struct Health;

#[async_trait]
impl Handler for Health {
    async fn call(&self, _req: Request, _ctx: &mut Context) -> Result<Response> {
        Response::json(StatusCode::OK, &HealthData { status: "UP" })
    }
}

/// `GET /api/championships/{id}`
///
/// The id is accepted but every lookup returns the same record.
pub struct GetChampionship;

#[async_trait]
impl Handler for GetChampionship {
    async fn call(&self, _req: Request, _ctx: &mut Context) -> Result<Response> {
        let champ = Championship {
            name: "Uefa",
            title: "Champions League",
            country: "Europe",
        };
        Response::json(StatusCode::OK, &champ)
    }
}

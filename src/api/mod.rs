use axum::{
    Router,
    extract::{Json, Query},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::info;

use crate::core::{
    Comparison, ConfigError, ConfigResult, ScenarioParameters, SimulationOptions, SurvivalHorizon,
    run_comparison_with,
};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
enum ApiHorizon {
    #[serde(alias = "lastSurvivor", alias = "last_survivor", alias = "both")]
    LastSurvivor,
    #[serde(alias = "firstDeath", alias = "first_death", alias = "first")]
    FirstDeath,
}

impl From<ApiHorizon> for SurvivalHorizon {
    fn from(value: ApiHorizon) -> Self {
        match value {
            ApiHorizon::LastSurvivor => SurvivalHorizon::LastSurvivor,
            ApiHorizon::FirstDeath => SurvivalHorizon::FirstDeath,
        }
    }
}

/// Flat overrides on top of the reference household. Rates are in percent.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SimulatePayload {
    start_year: Option<u32>,

    primary_age: Option<u32>,
    primary_life_expectancy: Option<u32>,
    primary_social_security: Option<f64>,
    primary_claim_age: Option<u32>,
    partner_age: Option<u32>,
    partner_life_expectancy: Option<u32>,
    partner_social_security: Option<f64>,
    partner_claim_age: Option<u32>,

    traditional_start: Option<f64>,
    roth_start: Option<f64>,
    taxable_start: Option<f64>,
    spending: Option<f64>,

    investment_return: Option<f64>,
    inflation: Option<f64>,
    capital_gains_rate: Option<f64>,
    standard_deduction: Option<f64>,
    conversion_ceiling: Option<f64>,
    horizon: Option<ApiHorizon>,

    model_taxable_account: Option<bool>,
    model_irmaa: Option<bool>,
}

/// Full parameter set, for callers that need custom bracket, RMD or IRMAA tables.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ParametersPayload {
    parameters: ScenarioParameters,
    model_taxable_account: Option<bool>,
    model_irmaa: Option<bool>,
}

#[derive(Debug)]
struct ApiRequest {
    params: ScenarioParameters,
    modeling: SimulationOptions,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SimulateResponse {
    parameters: ScenarioParameters,
    model_taxable_account: bool,
    model_irmaa: bool,
    #[serde(flatten)]
    comparison: Comparison,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

pub async fn run_http_server(port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = Router::new()
        .route("/api/defaults", get(defaults_handler))
        .route(
            "/api/simulate",
            get(simulate_get_handler).post(simulate_post_handler),
        )
        .route("/api/simulate/parameters", post(simulate_parameters_handler))
        .fallback(not_found_handler);

    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "Roth conversion API listening");
    info!("Local access: http://127.0.0.1:{port}/api/simulate");

    axum::serve(listener, app).await
}

async fn defaults_handler() -> Response {
    json_response(StatusCode::OK, ScenarioParameters::default())
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn simulate_get_handler(Query(payload): Query<SimulatePayload>) -> Response {
    simulate_handler_impl(api_request_from_payload(payload))
}

async fn simulate_post_handler(Json(payload): Json<SimulatePayload>) -> Response {
    simulate_handler_impl(api_request_from_payload(payload))
}

async fn simulate_parameters_handler(Json(payload): Json<ParametersPayload>) -> Response {
    simulate_handler_impl(api_request_from_parameters(payload))
}

fn simulate_handler_impl(request: ConfigResult<ApiRequest>) -> Response {
    let request = match request {
        Ok(request) => request,
        Err(err) => return error_response(StatusCode::BAD_REQUEST, &err.to_string()),
    };

    let comparison = run_comparison_with(&request.params, request.modeling);
    json_response(
        StatusCode::OK,
        SimulateResponse {
            parameters: request.params,
            model_taxable_account: request.modeling.model_taxable_account,
            model_irmaa: request.modeling.model_irmaa,
            comparison,
        },
    )
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        header::HeaderValue::from_static("no-store"),
    );
    response
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}

fn modeling_options(
    model_taxable_account: Option<bool>,
    model_irmaa: Option<bool>,
) -> SimulationOptions {
    let defaults = SimulationOptions::baseline();
    SimulationOptions {
        roth_conversions: false,
        model_taxable_account: model_taxable_account.unwrap_or(defaults.model_taxable_account),
        model_irmaa: model_irmaa.unwrap_or(defaults.model_irmaa),
    }
}

fn percent(label: &str, value: f64) -> ConfigResult<f64> {
    if !value.is_finite() {
        return Err(ConfigError::Invalid(format!("{label} must be a finite percentage")));
    }
    Ok(value / 100.0)
}

#[cfg(test)]
fn api_request_from_json(json: &str) -> ConfigResult<ApiRequest> {
    let payload = serde_json::from_str::<SimulatePayload>(json)?;
    api_request_from_payload(payload)
}

fn api_request_from_payload(payload: SimulatePayload) -> ConfigResult<ApiRequest> {
    let mut params = ScenarioParameters::default();

    if let Some(v) = payload.start_year {
        params.start_year = v;
    }

    if let Some(v) = payload.primary_age {
        params.primary.start_age = v;
    }
    if let Some(v) = payload.primary_life_expectancy {
        params.primary.life_expectancy = v;
    }
    if let Some(v) = payload.primary_social_security {
        params.primary.social_security_monthly = v;
    }
    if let Some(v) = payload.primary_claim_age {
        params.primary.social_security_claim_age = v;
    }
    if let Some(v) = payload.partner_age {
        params.partner.start_age = v;
    }
    if let Some(v) = payload.partner_life_expectancy {
        params.partner.life_expectancy = v;
    }
    if let Some(v) = payload.partner_social_security {
        params.partner.social_security_monthly = v;
    }
    if let Some(v) = payload.partner_claim_age {
        params.partner.social_security_claim_age = v;
    }

    if let Some(v) = payload.traditional_start {
        params.traditional_start = v;
    }
    if let Some(v) = payload.roth_start {
        params.roth_start = v;
    }
    if let Some(v) = payload.taxable_start {
        params.taxable_start = v;
    }
    if let Some(v) = payload.spending {
        params.annual_spending = v;
    }

    if let Some(v) = payload.investment_return {
        params.investment_return = percent("investmentReturn", v)?;
    }
    if let Some(v) = payload.inflation {
        params.inflation_rate = percent("inflation", v)?;
    }
    if let Some(v) = payload.capital_gains_rate {
        params.capital_gains_rate = percent("capitalGainsRate", v)?;
    }
    if let Some(v) = payload.standard_deduction {
        params.standard_deduction = v;
    }
    if let Some(v) = payload.conversion_ceiling {
        params.conversion_bracket_ceiling = v;
    }
    if let Some(v) = payload.horizon {
        params.horizon = v.into();
    }

    params.validate()?;
    Ok(ApiRequest {
        params,
        modeling: modeling_options(payload.model_taxable_account, payload.model_irmaa),
    })
}

fn api_request_from_parameters(payload: ParametersPayload) -> ConfigResult<ApiRequest> {
    payload.parameters.validate()?;
    Ok(ApiRequest {
        params: payload.parameters,
        modeling: modeling_options(payload.model_taxable_account, payload.model_irmaa),
    })
}

pub mod dsp;
pub mod error;
pub mod orchestrator;
pub mod params;
pub mod randomize;
pub mod wave;

use crate::params::{RenderOptions, RenderRequest};
use wasm_bindgen::prelude::*;

/// The crate version, read from Cargo.toml at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// WASM-exposed: return the padwave-core version string.
#[wasm_bindgen]
pub fn core_version() -> String {
    VERSION.to_string()
}

fn read_request(request: JsValue, options: JsValue) -> Result<(RenderRequest, RenderOptions), JsValue> {
    let request: RenderRequest =
        serde_wasm_bindgen::from_value(request).map_err(|e| JsValue::from_str(&format!("{e}")))?;
    let options: RenderOptions = if options.is_undefined() || options.is_null() {
        RenderOptions::default()
    } else {
        serde_wasm_bindgen::from_value(options).map_err(|e| JsValue::from_str(&format!("{e}")))?
    };
    Ok((request, options))
}

/// WASM-exposed: render a request to `{channels, frames, data}`.
#[wasm_bindgen]
pub fn render_wave(request: JsValue, options: JsValue) -> Result<JsValue, JsValue> {
    let (request, options) = read_request(request, options)?;
    let wave = dsp::renderer::render_wave(&request, &options).map_err(|e| JsValue::from_str(&format!("{e}")))?;
    serde_wasm_bindgen::to_value(&wave).map_err(|e| JsValue::from_str(&format!("{e}")))
}

/// WASM-exposed: render a request to a 16-bit PCM WAV byte array.
#[wasm_bindgen]
pub fn render_wave_wav(request: JsValue, options: JsValue) -> Result<Vec<u8>, JsValue> {
    let (request, options) = read_request(request, options)?;
    let wave = dsp::renderer::render_wave(&request, &options).map_err(|e| JsValue::from_str(&format!("{e}")))?;
    Ok(dsp::renderer::encode_wav(&wave, request.params.sample_rate.round() as u32))
}

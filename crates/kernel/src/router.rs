// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The operation whitelist.
//!
//! Static table from operation name to destination: an in-kernel handler
//! or a named worker, with the worker-vocabulary method name. Anything not
//! in the table is `UNKNOWN_OPERATION` before any further processing.

/// Where an operation executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    Local,
    Worker(&'static str),
}

/// Routing decision for one operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
    pub destination: Destination,
    /// Method name in the worker's vocabulary (meaningless for local).
    pub method: &'static str,
}

const fn local() -> Route {
    Route { destination: Destination::Local, method: "" }
}

const fn worker(name: &'static str, method: &'static str) -> Route {
    Route { destination: Destination::Worker(name), method }
}

/// Resolve an operation name. `None` means unknown.
pub fn route(op: &str) -> Option<Route> {
    let route = match op {
        // Kernel-local surface.
        "PING" | "GET_STATUS" | "GET_ENGINE_STATUS" => local(),
        "QUERY_CONTRACTS" | "GET_CONTRACT_BY_ID" | "QUERY_EXECUTION_HISTORY"
        | "QUERY_ACTIVITY_LOGS" => local(),
        "START_WORKFLOW" | "RESOLVE_APPROVAL" | "GET_PENDING_APPROVALS"
        | "REGISTER_WORKFLOW_TRIGGER" | "UNREGISTER_WORKFLOW_TRIGGER"
        | "LIST_WORKFLOW_TRIGGERS" => local(),
        "GET_AI_SUGGESTIONS" | "GENERATE_DRAFT" => local(),
        "SHUTDOWN" => local(),

        // Document and OCR/AI operations: python worker.
        "EXPORT_EXCEL" => worker("python", "export_excel"),
        "EXPORT_PDF" => worker("python", "export_pdf"),
        "EXPORT_IMAGE" => worker("python", "export_image"),
        "PDF_MERGE" => worker("python", "pdf_merge"),
        "PDF_SPLIT" => worker("python", "pdf_split"),
        "PDF_ROTATE" => worker("python", "pdf_rotate"),
        "PDF_WATERMARK" => worker("python", "pdf_watermark"),
        "IMAGE_COMPRESS" => worker("python", "image_compress"),
        "IMAGE_CONVERT" => worker("python", "image_convert"),
        "IMAGE_RESIZE" => worker("python", "image_resize"),
        "LIST_TEMPLATES" => worker("python", "list_templates"),
        "LOAD_TEMPLATE" => worker("python", "load_template"),
        "OCR_EXTRACT" => worker("python", "ocr_extract"),
        "AI_QUERY" => worker("python", "ai_query"),
        "AI_LEARN" => worker("python", "ai_learn"),

        // Crypto and performance operations: native worker.
        "CRYPTO_ENCRYPT" => worker("native", "crypto_encrypt"),
        "CRYPTO_DECRYPT" => worker("native", "crypto_decrypt"),
        "CRYPTO_HASH" => worker("native", "crypto_hash"),
        "PARALLEL_PROCESS" => worker("native", "parallel_process"),
        "COMPRESS_DATA" => worker("native", "compress_data"),

        // Network hub operations.
        "EXTERNAL_API_CALL" => worker("network", "external_api_call"),
        "LIST_PROVIDERS" => worker("network", "list_providers"),
        "GET_PROVIDER_INFO" => worker("network", "get_provider_info"),
        "SAVE_CREDENTIAL" => worker("network", "save_credential"),
        "DELETE_CREDENTIAL" => worker("network", "delete_credential"),
        "GET_RATE_LIMIT_STATUS" => worker("network", "get_rate_limit_status"),
        "GET_METRICS" => worker("network", "get_metrics"),

        _ => return None,
    };
    Some(route)
}

/// Operations whose payloads name filesystem paths (gateway path rules).
pub fn is_document_operation(op: &str) -> bool {
    matches!(
        op,
        "EXPORT_EXCEL"
            | "EXPORT_PDF"
            | "EXPORT_IMAGE"
            | "PDF_MERGE"
            | "PDF_SPLIT"
            | "PDF_ROTATE"
            | "PDF_WATERMARK"
            | "IMAGE_COMPRESS"
            | "IMAGE_CONVERT"
            | "IMAGE_RESIZE"
            | "LOAD_TEMPLATE"
            | "OCR_EXTRACT"
    )
}

#[cfg(test)]
#[path = "router_tests.rs"]
mod tests;

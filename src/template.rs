//! Template rendering with Tera
//!
//! Agent configuration templates are compiled into the binary with
//! `include_str!` and registered once per renderer. Variables are passed as a
//! JSON object; a reference to a variable that is not supplied fails the
//! render instead of producing an empty string.

use declarative::{Error, Result};
use std::error::Error as _;
use tera::{Context, Tera};

/// Agent configuration file
pub const CLIENT_RB: &str = "client.rb.j2";
/// Validator private key
pub const VALIDATION_PEM: &str = "validation.pem.j2";
/// First-run attributes and run list
pub const RUNLIST_JSON: &str = "runlist.json.j2";

/// All embedded templates as (name, content) pairs for registration with Tera.
pub const ALL_TEMPLATES: &[(&str, &str)] = &[
    (CLIENT_RB, include_str!("templates/client.rb.j2")),
    (VALIDATION_PEM, include_str!("templates/validation.pem.j2")),
    (RUNLIST_JSON, include_str!("templates/runlist.json.j2")),
];

pub struct TemplateRenderer {
    tera: Tera,
}

impl TemplateRenderer {
    /// Renderer over the embedded templates
    pub fn from_embedded() -> Result<Self> {
        let mut tera = Tera::default();
        for (name, content) in ALL_TEMPLATES {
            tera.add_raw_template(name, content)
                .map_err(|e| render_error(name, &e))?;
            log::trace!("Loaded embedded template: {}", name);
        }
        Ok(Self { tera })
    }

    /// Render a template with the variables in `vars` (a JSON object)
    pub fn render(&self, template_name: &str, vars: &serde_json::Value) -> Result<String> {
        let context =
            Context::from_value(vars.clone()).map_err(|e| render_error(template_name, &e))?;
        self.tera
            .render(template_name, &context)
            .map_err(|e| render_error(template_name, &e))
    }
}

impl std::fmt::Debug for TemplateRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateRenderer")
            .field("templates", &self.tera.get_template_names().collect::<Vec<_>>())
            .finish()
    }
}

// Tera nests the useful part ("Variable `x` not found") in the source chain
fn render_error(template: &str, err: &tera::Error) -> Error {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    Error::Render {
        template: template.to_string(),
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn client_vars() -> serde_json::Value {
        json!({
            "log_level": "info",
            "log_location": "/var/log/chef-client.log",
            "server_url": "https://chef.example.com/organizations/acme",
            "validation_name": "acme-validator",
            "config_dir": "/etc/chef",
            "node_name": "web01-20240101000000",
            "ca_file": "",
            "ca_path": "/etc/chef/https_ca_file.crt",
        })
    }

    #[test]
    fn test_render_client_rb() {
        let renderer = TemplateRenderer::from_embedded().unwrap();
        let out = renderer.render(CLIENT_RB, &client_vars()).unwrap();

        assert!(out.contains("log_level        :info"));
        assert!(out.contains("node_name        \"web01-20240101000000\""));
        assert!(!out.contains("ssl_ca_file"));
    }

    #[test]
    fn test_render_client_rb_with_ca() {
        let renderer = TemplateRenderer::from_embedded().unwrap();
        let mut vars = client_vars();
        vars["ca_file"] = json!("-----BEGIN CERTIFICATE-----");
        let out = renderer.render(CLIENT_RB, &vars).unwrap();

        assert!(out.contains("ssl_ca_file      \"/etc/chef/https_ca_file.crt\""));
    }

    #[test]
    fn test_missing_variable_is_render_error() {
        let renderer = TemplateRenderer::from_embedded().unwrap();
        let mut vars = client_vars();
        vars.as_object_mut().unwrap().remove("node_name");

        let err = renderer.render(CLIENT_RB, &vars).unwrap_err();
        match err {
            Error::Render { template, message } => {
                assert_eq!(template, CLIENT_RB);
                assert!(message.contains("node_name"), "{message}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_runlist_json_is_valid_json() {
        let renderer = TemplateRenderer::from_embedded().unwrap();
        let out = renderer
            .render(
                RUNLIST_JSON,
                &json!({
                    "node_name": "db-\"quoted\"",
                    "environment": "prod",
                    "company": "acme",
                    "run_list": ["role[base]", "role[db]"],
                }),
            )
            .unwrap();

        let parsed: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed["name"], "db-\"quoted\"");
        assert_eq!(parsed["run_list"][1], "role[db]");
    }

    #[test]
    fn test_non_object_vars_rejected() {
        let renderer = TemplateRenderer::from_embedded().unwrap();
        assert!(renderer.render(VALIDATION_PEM, &json!(["x"])).is_err());
    }
}

use super::Features;
use crate::codegen::emitter::Emitter;
use serde_json::{json, Map, Value};

/// OpenAPI 3.0.3 document derived from the route table. Path parameters use
/// the `{name}` spelling; wildcard segments are left as-is.
pub fn build_spec(f: &Features<'_, '_>) -> Value {
    let mut paths: Map<String, Value> = Map::new();
    for route in &f.routes {
        let oas_path = to_openapi_path(&route.path);
        let entry = paths
            .entry(oas_path.clone())
            .or_insert_with(|| Value::Object(Map::new()));
        let Some(obj) = entry.as_object_mut() else { continue };

        let mut operation = Map::new();
        let params: Vec<Value> = route
            .path
            .split('/')
            .filter_map(|segment| segment.strip_prefix(':'))
            .map(|name| {
                json!({
                    "name": name,
                    "in": "path",
                    "required": true,
                    "schema": { "type": "string" }
                })
            })
            .collect();
        if !params.is_empty() {
            operation.insert("parameters".to_string(), Value::Array(params));
        }
        let secured = f
            .protects
            .iter()
            .any(|rule| rule.pattern == route.path || route.path.starts_with(rule.pattern.trim_end_matches("**")));
        if secured && f.has_auth() {
            operation.insert("security".to_string(), json!([{ "bearerAuth": [] }]));
        }
        operation.insert(
            "responses".to_string(),
            json!({
                "200": { "description": "OK" },
                "default": { "description": "Error" }
            }),
        );
        obj.insert(
            route.method.to_lowercase(),
            Value::Object(operation),
        );
    }

    let mut spec = json!({
        "openapi": "3.0.3",
        "info": {
            "title": "Tova API",
            "version": "0.1.0"
        },
        "paths": Value::Object(paths)
    });
    if f.jwt() {
        spec["components"] = json!({
            "securitySchemes": {
                "bearerAuth": { "type": "http", "scheme": "bearer", "bearerFormat": "JWT" }
            }
        });
    } else if f.api_key() {
        spec["components"] = json!({
            "securitySchemes": {
                "apiKeyAuth": { "type": "apiKey", "in": "header", "name": "X-Api-Key" }
            }
        });
    }
    spec
}

fn to_openapi_path(path: &str) -> String {
    path.split('/')
        .map(|segment| match segment.strip_prefix(':') {
            Some(name) => format!("{{{}}}", name),
            None => segment.to_string(),
        })
        .collect::<Vec<_>>()
        .join("/")
}

pub fn emit_openapi(em: &mut Emitter, spec: &Value) {
    em.blank();
    let spec_text = serde_json::to_string(spec).unwrap_or_else(|_| "{}".to_string());
    em.line(&format!("const __openApiSpec = {};", spec_text));
    em.template(
        r##"
const __swaggerUi = `<!doctype html>
<html>
  <head>
    <title>API docs</title>
    <link rel="stylesheet" href="https://unpkg.com/swagger-ui-dist@5/swagger-ui.css" />
  </head>
  <body>
    <div id="swagger-ui"></div>
    <script src="https://unpkg.com/swagger-ui-dist@5/swagger-ui-bundle.js"></script>
    <script>
      SwaggerUIBundle({ url: "/openapi.json", dom_id: "#swagger-ui" });
    </script>
  </body>
</html>`;
"##,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_params_convert_to_braces() {
        assert_eq!(to_openapi_path("/api/users/:id"), "/api/users/{id}");
        assert_eq!(to_openapi_path("/api/users"), "/api/users");
    }
}

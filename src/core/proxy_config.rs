use std::path::PathBuf;

use chrono::{DateTime, Utc};

/// A rendered nginx site definition for one domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxySiteConfig {
    pub domain: String,
    pub backend_origin: String,
    pub tls_cert_path: PathBuf,
    pub tls_key_path: PathBuf,
    pub generated_at: DateTime<Utc>,
    pub rendered: String,
}

/// Renders site definitions. Pure: no I/O happens here.
#[derive(Debug, Clone)]
pub struct ProxyConfigGenerator {
    client_max_body_size: String,
}

impl ProxyConfigGenerator {
    pub fn new(client_max_body_size: impl Into<String>) -> Self {
        Self {
            client_max_body_size: client_max_body_size.into(),
        }
    }

    pub fn render(
        &self,
        domain: &str,
        backend_origin: &str,
        cert_path: PathBuf,
        key_path: PathBuf,
        generated_at: DateTime<Utc>,
    ) -> ProxySiteConfig {
        let backend = backend_origin.trim_end_matches('/');
        let rendered = format!(
            r#"# Managed by provisio for {domain}. Generated {generated}; manual edits are overwritten.

server {{
    listen 80;
    listen [::]:80;
    server_name {domain} *.{domain};

    location / {{
        return 301 https://$host$request_uri;
    }}
}}

server {{
    listen 443 ssl http2;
    listen [::]:443 ssl http2;
    server_name {domain} *.{domain};

    ssl_certificate {cert};
    ssl_certificate_key {key};
    ssl_protocols TLSv1.2 TLSv1.3;
    ssl_prefer_server_ciphers on;
    ssl_session_cache shared:SSL:10m;
    ssl_session_timeout 1d;

    client_max_body_size {body_size};

    location = /health {{
        access_log off;
        default_type text/plain;
        return 200 "ok\n";
    }}

    location / {{
        proxy_pass {backend};
        proxy_http_version 1.1;
        proxy_set_header Host $host;
        proxy_set_header X-Real-IP $remote_addr;
        proxy_set_header X-Forwarded-For $proxy_add_x_forwarded_for;
        proxy_set_header X-Forwarded-Proto $scheme;
        proxy_set_header Upgrade $http_upgrade;
        proxy_set_header Connection "upgrade";
        proxy_read_timeout 86400;
    }}
}}
"#,
            generated = generated_at.to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
            cert = cert_path.display(),
            key = key_path.display(),
            body_size = self.client_max_body_size,
        );

        ProxySiteConfig {
            domain: domain.to_string(),
            backend_origin: backend.to_string(),
            tls_cert_path: cert_path,
            tls_key_path: key_path,
            generated_at,
            rendered,
        }
    }
}

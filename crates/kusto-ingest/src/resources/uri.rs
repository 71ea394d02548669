use crate::{Error, Result};
use url::Url;

/// ResourceUri is one credentialed storage endpoint vended by the control
/// plane: `https://<account>.<service>.<suffix>/<name>?<sas-query>`. It is
/// split at construction into the service URL, the addressed object, and
/// the raw SAS query that authorizes access.
#[derive(Debug, Clone)]
pub struct ResourceUri {
    uri: String,
    service_url: String,
    object_name: String,
    sas: String,
}

impl ResourceUri {
    /// The full URI, SAS query included.
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Scheme and authority, without the object path or query.
    pub fn service_url(&self) -> &str {
        &self.service_url
    }

    /// The addressed container, queue, or table name.
    pub fn object_name(&self) -> &str {
        &self.object_name
    }

    /// The raw SAS query string, without the leading `?`.
    pub fn sas(&self) -> &str {
        &self.sas
    }

    /// Assemble an authenticated URL for a child blob of this resource.
    pub fn child_url(&self, child: &str) -> String {
        format!(
            "{}/{}/{}?{}",
            self.service_url, self.object_name, child, self.sas
        )
    }
}

impl TryFrom<&str> for ResourceUri {
    type Error = Error;

    fn try_from(uri: &str) -> Result<Self> {
        let invalid = |reason| Error::InvalidResourceUri {
            uri: uri.to_string(),
            reason,
        };

        let parsed = Url::parse(uri).map_err(|_| invalid("not a valid URL"))?;
        let host = parsed.host_str().ok_or_else(|| invalid("missing host"))?;

        let service_url = match parsed.port() {
            Some(port) => format!("{}://{}:{}", parsed.scheme(), host, port),
            None => format!("{}://{}", parsed.scheme(), host),
        };
        let object_name = parsed.path().trim_start_matches('/').to_string();
        if object_name.is_empty() {
            return Err(invalid("missing object path"));
        }
        let sas = parsed
            .query()
            .ok_or_else(|| invalid("missing SAS query"))?
            .to_string();

        Ok(Self {
            uri: uri.to_string(),
            service_url,
            object_name,
            sas,
        })
    }
}

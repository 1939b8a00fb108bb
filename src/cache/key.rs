use std::fmt;

use crate::query::orchestrator::QueryRequest;

/// Canonical encoding of every parameter that shapes a cached response.
///
/// Fields are joined with `&` in a fixed order; absent optional fields
/// encode as empty strings. Pagination is not part of the signature since
/// cached responses are stored unpaginated.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QuerySignature(String);

impl QuerySignature {
    pub fn new(request: &QueryRequest) -> Self {
        let variant_type = request
            .variant_type
            .as_ref()
            .map(|t| t.as_str().to_string())
            .unwrap_or_default();
        let fields = [
            request.region_start.to_string(),
            request.region_end.to_string(),
            request.end_min.to_string(),
            request.end_max.to_string(),
            request.reference_bases.to_uppercase(),
            request
                .alternate_bases
                .as_deref()
                .map(str::to_uppercase)
                .unwrap_or_default(),
            variant_type,
            request.include_datasets.as_str().to_string(),
        ];
        Self(fields.join("&"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Hex MD5 of the signature, used to name blobs
    pub fn digest(&self) -> String {
        format!("{:x}", md5::compute(self.0.as_bytes()))
    }

    /// Blob file name for this signature
    pub fn blob_name(&self) -> String {
        format!("{}.json", self.digest())
    }
}

impl fmt::Display for QuerySignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for QuerySignature {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

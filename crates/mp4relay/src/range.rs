//! # Range Resolution
//!
//! Resolves an inbound `Range` header against a known total length into
//! the serving window: the inclusive byte span to read and whether the
//! response is a full (200) or partial (206) one.
//!
//! Unsatisfiable and malformed `bytes=` ranges are rejected explicitly
//! rather than handed to the seek path; callers map [`RangeError`] to a
//! 416 response. A header with a unit other than `bytes` is ignored per
//! HTTP semantics and the request is served in full.

/// The resolved inclusive byte span `[start, end]` within an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServingWindow {
    pub start: u64,
    /// Inclusive end offset.
    pub end: u64,
    /// Total length of the underlying entry.
    pub total: u64,
    /// Whether this window answers a range request (206) or the whole
    /// entry (200).
    pub partial: bool,
}

impl ServingWindow {
    /// Declared content length of the response.
    pub fn length(&self) -> u64 {
        if self.total == 0 {
            0
        } else {
            self.end - self.start + 1
        }
    }

    /// `Content-Range` header value, present only for partial windows.
    pub fn content_range(&self) -> Option<String> {
        self.partial
            .then(|| format!("bytes {}-{}/{}", self.start, self.end, self.total))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RangeError {
    #[error("unsatisfiable range `{spec}` for length {total}")]
    Unsatisfiable { spec: String, total: u64 },
}

impl RangeError {
    /// `Content-Range` value for a 416 response.
    pub fn content_range(&self) -> String {
        let RangeError::Unsatisfiable { total, .. } = self;
        format!("bytes */{total}")
    }
}

/// Resolve an optional `Range` header value against the entry length.
pub fn resolve_window(range_header: Option<&str>, total: u64) -> Result<ServingWindow, RangeError> {
    let full = ServingWindow {
        start: 0,
        end: total.saturating_sub(1),
        total,
        partial: false,
    };

    let Some(header) = range_header else {
        return Ok(full);
    };

    // Only the bytes unit is understood; anything else is ignored
    let Some(spec) = header.strip_prefix("bytes=") else {
        return Ok(full);
    };

    let unsatisfiable = || RangeError::Unsatisfiable {
        spec: spec.to_string(),
        total,
    };

    let (start_str, end_str) = spec.split_once('-').ok_or_else(unsatisfiable)?;
    let start: u64 = start_str.parse().map_err(|_| unsatisfiable())?;

    let end = if end_str.is_empty() {
        total.saturating_sub(1)
    } else {
        let parsed: u64 = end_str.parse().map_err(|_| unsatisfiable())?;
        // An end beyond EOF is clamped, not rejected
        parsed.min(total.saturating_sub(1))
    };

    if start >= total || start > end {
        return Err(unsatisfiable());
    }

    Ok(ServingWindow {
        start,
        end,
        total,
        partial: true,
    })
}

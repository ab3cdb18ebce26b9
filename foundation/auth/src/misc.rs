use crate::error::Error;

pub(crate) trait Required {
    /// Returns the value, or a configuration error naming `field` when it is absent or blank.
    fn required(&self, field: &'static str) -> Result<String, Error>;
}

impl Required for Option<String> {
    fn required(&self, field: &'static str) -> Result<String, Error> {
        match self.as_deref().map(str::trim) {
            Some(s) if !s.is_empty() => Ok(s.to_string()),
            _ => Err(Error::missing(field)),
        }
    }
}

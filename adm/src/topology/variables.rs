//! `${variable}` substitution in service configuration

use std::collections::HashMap;

use crate::errors::AdmError;
use crate::topology::declaration::ConfigMap;

/// Values available to `${...}` references of one service
pub struct Variables {
    values: HashMap<&'static str, String>,
}

impl Variables {
    pub fn new() -> Self {
        Self {
            values: HashMap::new(),
        }
    }

    pub fn with(mut self, name: &'static str, value: impl ToString) -> Self {
        self.values.insert(name, value.to_string());
        self
    }

    /// Replace every `${name}` in `input`.
    ///
    /// An unterminated reference or an unknown name is an error.
    pub fn render(&self, input: &str) -> Result<String, String> {
        let mut output = String::with_capacity(input.len());
        let mut rest = input;

        while let Some(start) = rest.find("${") {
            output.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let end = after
                .find('}')
                .ok_or_else(|| format!("unterminated variable in '{}'", input))?;
            let name = &after[..end];
            let value = self
                .values
                .get(name)
                .ok_or_else(|| format!("unknown variable '${{{}}}'", name))?;
            output.push_str(value);
            rest = &after[end + 1..];
        }
        output.push_str(rest);

        Ok(output)
    }

    /// Render every string value of `config`; `key` of the failing entry is reported
    pub fn render_config(&self, config: &mut ConfigMap) -> Result<(), AdmError> {
        for (key, value) in config.iter_mut() {
            if let serde_json::Value::String(s) = value {
                *s = self
                    .render(s)
                    .map_err(|e| AdmError::InvalidTopology(format!("config '{}': {}", key, e)))?;
            }
        }
        Ok(())
    }
}

impl Default for Variables {
    fn default() -> Self {
        Self::new()
    }
}

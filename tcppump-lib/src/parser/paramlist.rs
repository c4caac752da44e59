use crate::address::{IpAddress, Ip6Address, MacAddress};
use crate::error::{PumpError, Result};
use crate::parser::value;

/// One `name=value` pair from a parsed parameter list, with its position in
/// the list (used for duplicate-aware, order-sensitive lookups).
#[derive(Debug, Clone)]
pub struct Parameter {
    pub name: String,
    pub value: String,
    pub index: usize,
}

impl Parameter {
    pub fn as_int_ranged(&self, range_begin: u64, range_end: u64) -> Result<u64> {
        value::parse_int_ranged(&self.name, &self.value, range_begin, range_end)
    }

    pub fn as_u8(&self, range_begin: u8, range_end: u8) -> Result<u8> {
        value::parse_u8(&self.name, &self.value, range_begin, range_end)
    }

    pub fn as_u16(&self, range_begin: u16, range_end: u16) -> Result<u16> {
        value::parse_u16(&self.name, &self.value, range_begin, range_end)
    }

    pub fn as_u32(&self, range_begin: u32, range_end: u32) -> Result<u32> {
        value::parse_u32(&self.name, &self.value, range_begin, range_end)
    }

    pub fn as_bool(&self) -> Result<bool> {
        value::parse_bool(&self.name, &self.value)
    }

    pub fn as_mac(&self) -> Result<MacAddress> {
        value::parse_mac(&self.name, &self.value)
    }

    pub fn as_ipv4(&self) -> Result<IpAddress> {
        value::parse_ipv4(&self.name, &self.value)
    }

    pub fn as_ipv6(&self) -> Result<Ip6Address> {
        value::parse_ipv6(&self.name, &self.value)
    }

    pub fn as_stream(&self) -> Result<Vec<u8>> {
        value::parse_hex_stream(&self.name, &self.value)
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }
}

/// A parsed `(name=value, name=value, ...)` parameter list, as it appears
/// after a protocol keyword in an inline packet expression.
#[derive(Debug, Clone, Default)]
pub struct ParameterList {
    params: Vec<Parameter>,
}

fn is_name_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

impl ParameterList {
    /// Parses a `(...)`-delimited parameter list. `input` must begin with `(`.
    pub fn parse(input: &str) -> Result<Self> {
        let chars: Vec<char> = input.chars().collect();
        if chars.first() != Some(&'(') {
            return Err(PumpError::parse("parameter list must start with '('", crate::error::Span::default()));
        }

        let mut params = Vec::new();
        let mut i = 1usize;
        let syntax_err = |pos: usize| PumpError::parse(format!("malformed parameter list at offset {pos}"), crate::error::Span::default());

        while i < chars.len() && chars[i] != ')' {
            while i < chars.len() && chars[i].is_whitespace() {
                i += 1;
            }
            if i >= chars.len() || chars[i] == ')' {
                break;
            }

            if !is_name_start(chars[i]) {
                return Err(syntax_err(i));
            }
            let name_start = i;
            while i < chars.len() && is_name_char(chars[i]) {
                i += 1;
            }
            let name: String = chars[name_start..i].iter().collect();

            while i < chars.len() && chars[i].is_whitespace() {
                i += 1;
            }
            if i >= chars.len() || chars[i] != '=' {
                return Err(syntax_err(i));
            }
            i += 1;
            while i < chars.len() && chars[i].is_whitespace() {
                i += 1;
            }

            let value_start = i;
            while i < chars.len() && chars[i] != ',' && chars[i] != ')' && !chars[i].is_whitespace() {
                i += 1;
            }
            let value: String = chars[value_start..i].iter().collect();
            if value.is_empty() {
                return Err(syntax_err(i));
            }

            let index = params.len();
            params.push(Parameter { name, value, index });

            while i < chars.len() && chars[i].is_whitespace() {
                i += 1;
            }
            if i >= chars.len() || (chars[i] != ',' && chars[i] != ')') {
                return Err(syntax_err(i));
            }
            if chars[i] == ',' {
                i += 1;
            }
        }

        if i >= chars.len() || chars[i] != ')' {
            return Err(syntax_err(i));
        }

        Ok(Self { params })
    }

    /// Finds a required parameter by name, starting the scan right after
    /// `start_after` (if given) and stopping early at `stop_at` (used to keep
    /// a script-level scan from crossing into the next instruction's params).
    pub fn find_after<'a>(&'a self, start_after: Option<&Parameter>, stop_at: Option<&str>, name: &str) -> Result<&'a Parameter> {
        let start = start_after.map(|p| p.index + 1).unwrap_or(0);
        for p in self.params.iter().skip(start) {
            if Some(p.name.as_str()) == stop_at {
                break;
            }
            if p.name == name {
                return Ok(p);
            }
        }
        Err(PumpError::ParamUnknown { name: name.into() })
    }

    pub fn find(&self, name: &str) -> Result<&Parameter> {
        self.find_after(None, None, name)
    }

    pub fn find_optional(&self, name: &str) -> Option<&Parameter> {
        self.find(name).ok()
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Parameter> {
        self.params.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_whitespace_tolerant_list() {
        let list = ParameterList::parse("(     first=100, second = 200, third   =300)").unwrap();
        assert_eq!(list.find("first").unwrap().as_int_ranged(0, 1000).unwrap(), 100);
        assert_eq!(list.find("second").unwrap().as_int_ranged(0, 1000).unwrap(), 200);
        assert_eq!(list.find("third").unwrap().as_int_ranged(0, 1000).unwrap(), 300);
    }

    #[test]
    fn unknown_parameter_is_an_error() {
        let list = ParameterList::parse("(first=100)").unwrap();
        assert!(matches!(list.find("f").unwrap_err(), PumpError::ParamUnknown { .. }));
        assert!(matches!(list.find("firstfirst").unwrap_err(), PumpError::ParamUnknown { .. }));
    }

    #[test]
    fn value_conversions_report_format_errors() {
        let list = ParameterList::parse("(first=100, second=200, third=300, fourth=x12)").unwrap();
        assert!(matches!(list.find("third").unwrap().as_mac().unwrap_err(), PumpError::ParamFormat { .. }));
        assert!(matches!(list.find("fourth").unwrap().as_ipv4().unwrap_err(), PumpError::ParamFormat { .. }));
    }

    #[test]
    fn range_check_on_int_conversion() {
        let list = ParameterList::parse("(first=100)").unwrap();
        assert_eq!(list.find("first").unwrap().as_int_ranged(100, 100).unwrap(), 100);
        assert!(matches!(list.find("first").unwrap().as_int_ranged(101, 102).unwrap_err(), PumpError::ParamRange { .. }));
    }

    #[test]
    fn prefix_names_are_distinct_parameters() {
        let list = ParameterList::parse("(first=100, firstsecond = 200, third   =300)").unwrap();
        assert_eq!(list.find("first").unwrap().as_int_ranged(0, 1000).unwrap(), 100);
        assert_eq!(list.find("firstsecond").unwrap().as_int_ranged(0, 1000).unwrap(), 200);
    }

    #[test]
    fn rejects_malformed_lists() {
        assert!(ParameterList::parse("(first=100.firstsecond = 200, third   =300)").is_err());
        assert!(ParameterList::parse("(d,first=100)").is_err());
        assert!(ParameterList::parse("(=123)").is_err());
    }

    #[test]
    fn accepts_leading_whitespace_single_param() {
        let list = ParameterList::parse("(  first=123)").unwrap();
        assert_eq!(list.find("first").unwrap().as_int_ranged(0, 1000).unwrap(), 123);
    }

    #[test]
    fn find_after_skips_earlier_duplicate_and_honors_stop_at() {
        let list = ParameterList::parse("(dst=1.1.1.1, src=2.2.2.2, dst=3.3.3.3, end=1)").unwrap();
        let first_dst = list.find("dst").unwrap();
        let second_dst = list.find_after(Some(first_dst), None, "dst").unwrap();
        assert_eq!(second_dst.value, "3.3.3.3");

        assert!(list.find_after(None, Some("end"), "dst").is_ok());
        assert!(list.find_after(Some(second_dst), Some("end"), "dst").is_err());
    }
}

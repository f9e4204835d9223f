//! Well-known namespace URIs.

pub const XML_URI: &str = "http://www.w3.org/XML/1998/namespace";
pub const XMLNS_URI: &str = "http://www.w3.org/2000/xmlns/";
pub const XS: &str = "http://www.w3.org/2001/XMLSchema";
pub const FNS: &str = "http://www.w3.org/2005/xpath-functions";
pub const MAP_NS: &str = "http://www.w3.org/2005/xpath-functions/map";
pub const ARRAY_NS: &str = "http://www.w3.org/2005/xpath-functions/array";
pub const MATH_NS: &str = "http://www.w3.org/2005/xpath-functions/math";
pub const ERR_NS: &str = "http://www.w3.org/2005/xqt-errors";

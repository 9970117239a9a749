//! Identifiers for supplementary queries against a running rendering engine
//! (memory statistics, view listings, raster cache sizing). The
//! reconstruction core treats these purely as opaque string constants; their
//! request/response shapes belong to the engine connection layer.

pub const LIST_VIEWS_QUERY: &str = "listViews";
pub const MEMORY_INFO_QUERY: &str = "getMemoryUsage";
pub const RASTER_CACHE_QUERY: &str = "estimateRasterCacheMemory";

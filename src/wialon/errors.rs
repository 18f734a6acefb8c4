//! Wialon Remote API error codes and data flags

/// Text for a Remote API error code
pub fn error_text(code: i64) -> &'static str {
    match code {
        0 => "Successful operation",
        1 => "Invalid session",
        2 => "Invalid service name",
        3 => "Invalid result",
        4 => "Invalid input",
        5 => "Error performing request",
        6 => "Unknown error",
        7 => "Access denied",
        8 => "Invalid user name or password",
        9 => "Authorization server is unavailable",
        10 => "Reached limit of concurrent requests",
        11 => "Password reset error",
        14 => "Billing error",
        1001 => "No messages for selected interval",
        1002 => "Item with such unique property already exists or Item cannot be created according to billing restrictions",
        1003 => "Only one request is allowed at the moment",
        1004 => "Limit of messages has been exceeded",
        1005 => "Execution time has exceeded the limit",
        1006 => "Exceeding the limit of attempts to enter a two-factor authorization code",
        1011 => "Your IP has changed or session has expired",
        2014 => "Selected user is a creator for some system objects, thus this user cannot be bound to a new account",
        2015 => "Sensor deleting is forbidden because of using in another sensor or advanced properties of the unit",
        _ => "Unknown error",
    }
}

/// Data flags requested through `core/update_data_flags` and
/// `core/search_item`
pub mod flags {
    pub const BASE: u64 = 0x1;
    pub const RESOURCE_DRIVERS: u64 = 0x100;
    pub const UNIT_COMMANDS: u64 = 0x200;
    pub const UNIT_LAST_POSITION: u64 = 0x400;
    pub const UNIT_SENSORS: u64 = 0x1000;
    pub const RESOURCE_REPORTS: u64 = 0x2000;

    /// Message flags for `messages/load_interval`
    pub const MESSAGES_WITH_DATA: u64 = 0x1;
    pub const MESSAGES_TYPE_MASK: u64 = 0xFF01;
}

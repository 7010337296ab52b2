/// API path prefix
pub const API_PREFIX: &str = "/v1";

/// Steam Web API endpoint listing registered game servers
pub const STEAM_SERVER_LIST_URL: &str =
    "https://api.steampowered.com/IGameServersService/GetServerList/v1/";

/// Steam master filter keys
pub const FILTER_GAMEDIR: &str = "\\gamedir\\";
pub const FILTER_GAMEADDR: &str = "\\gameaddr\\";

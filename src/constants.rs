/// 单次练习最多可请求的题目数
pub const MAX_QUESTION_COUNT: usize = 200;

/// 未指定数量时的默认题目数
pub const DEFAULT_QUESTION_COUNT: usize = 10;

/// 列表接口默认分页大小
pub const DEFAULT_PAGE_SIZE: u64 = 20;

/// 列表接口最大分页大小
pub const MAX_PAGE_SIZE: u64 = 100;

/// 自适应事件广播通道容量
pub const ADAPTATION_CHANNEL_CAPACITY: usize = 256;

/// 事件流首屏回放的历史事件数
pub const ADAPTATION_REPLAY_LIMIT: usize = 20;

/// SSE 心跳间隔（秒）
pub const SSE_KEEPALIVE_SECS: u64 = 15;

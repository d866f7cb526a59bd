//! Wire protocol constants.
//!
//! Operation codes, parameter buffer tags, BLR codes, information items and
//! status codes of the Firebird remote protocol.
#![allow(dead_code)]

// Connect phase.
pub const CONNECT_VERSION3: i32 = 3;
pub const ARCH_GENERIC: i32 = 1;

pub const PROTOCOL_VERSION10: i32 = 10;
pub const FB_PROTOCOL_FLAG: i32 = 0x8000;
pub const PROTOCOL_VERSION11: i32 = FB_PROTOCOL_FLAG | 11;
pub const PROTOCOL_VERSION12: i32 = FB_PROTOCOL_FLAG | 12;
pub const PROTOCOL_VERSION13: i32 = FB_PROTOCOL_FLAG | 13;
pub const PROTOCOL_VERSION15: i32 = FB_PROTOCOL_FLAG | 15;
pub const PROTOCOL_VERSION16: i32 = FB_PROTOCOL_FLAG | 16;

pub const PTYPE_RPC: i32 = 2;
pub const PTYPE_BATCH_SEND: i32 = 3;
pub const PTYPE_LAZY_SEND: i32 = 5;
pub const PFLAG_COMPRESS: i32 = 0x100;

// Operation codes.
pub const OP_CONNECT: i32 = 1;
pub const OP_EXIT: i32 = 2;
pub const OP_ACCEPT: i32 = 3;
pub const OP_REJECT: i32 = 4;
pub const OP_DISCONNECT: i32 = 6;
pub const OP_RESPONSE: i32 = 9;

pub const OP_ATTACH: i32 = 19;
pub const OP_CREATE: i32 = 20;
pub const OP_DETACH: i32 = 21;

pub const OP_TRANSACTION: i32 = 29;
pub const OP_COMMIT: i32 = 30;
pub const OP_ROLLBACK: i32 = 31;

pub const OP_INFO_DATABASE: i32 = 40;

pub const OP_QUE_EVENTS: i32 = 48;
pub const OP_CANCEL_EVENTS: i32 = 49;
pub const OP_COMMIT_RETAINING: i32 = 50;

pub const OP_ALLOCATE_STATEMENT: i32 = 62;
pub const OP_EXECUTE: i32 = 63;
pub const OP_EXEC_IMMEDIATE: i32 = 64;
pub const OP_FETCH: i32 = 65;
pub const OP_FETCH_RESPONSE: i32 = 66;
pub const OP_FREE_STATEMENT: i32 = 67;
pub const OP_PREPARE_STATEMENT: i32 = 68;
pub const OP_INFO_SQL: i32 = 70;
pub const OP_DUMMY: i32 = 71;

pub const OP_EXECUTE2: i32 = 76;
pub const OP_SQL_RESPONSE: i32 = 78;
pub const OP_DROP_DATABASE: i32 = 81;
pub const OP_SERVICE_ATTACH: i32 = 82;
pub const OP_SERVICE_DETACH: i32 = 83;
pub const OP_SERVICE_INFO: i32 = 84;
pub const OP_SERVICE_START: i32 = 85;
pub const OP_ROLLBACK_RETAINING: i32 = 86;

pub const OP_PARTIAL: i32 = 89;
pub const OP_TRUSTED_AUTH: i32 = 90;
pub const OP_CANCEL: i32 = 91;
pub const OP_CONT_AUTH: i32 = 92;
pub const OP_PING: i32 = 93;
pub const OP_ACCEPT_DATA: i32 = 94;
pub const OP_CRYPT: i32 = 96;
pub const OP_CRYPT_KEY_CALLBACK: i32 = 97;
pub const OP_COND_ACCEPT: i32 = 98;

// User identification tags (CNCT).
pub const CNCT_USER: u8 = 1;
pub const CNCT_PASSWD: u8 = 2;
pub const CNCT_HOST: u8 = 4;
pub const CNCT_GROUP: u8 = 5;
pub const CNCT_USER_VERIFICATION: u8 = 6;
pub const CNCT_SPECIFIC_DATA: u8 = 7;
pub const CNCT_PLUGIN_NAME: u8 = 8;
pub const CNCT_LOGIN: u8 = 9;
pub const CNCT_PLUGIN_LIST: u8 = 10;
pub const CNCT_CLIENT_CRYPT: u8 = 11;

pub const WIRE_CRYPT_DISABLED: i32 = 0;
pub const WIRE_CRYPT_ENABLED: i32 = 1;
pub const WIRE_CRYPT_REQUIRED: i32 = 2;

// Database parameter buffer tags.
pub const ISC_DPB_VERSION1: u8 = 1;
pub const ISC_DPB_PAGE_SIZE: u8 = 4;
pub const ISC_DPB_FORCE_WRITE: u8 = 24;
pub const ISC_DPB_USER_NAME: u8 = 28;
pub const ISC_DPB_PASSWORD: u8 = 29;
pub const ISC_DPB_PASSWORD_ENC: u8 = 30;
pub const ISC_DPB_LC_CTYPE: u8 = 48;
pub const ISC_DPB_SQL_ROLE_NAME: u8 = 60;
pub const ISC_DPB_OVERWRITE: u8 = 54;
pub const ISC_DPB_CONNECT_TIMEOUT: u8 = 57;
pub const ISC_DPB_DUMMY_PACKET_INTERVAL: u8 = 58;
pub const ISC_DPB_SQL_DIALECT: u8 = 63;
pub const ISC_DPB_SET_DB_CHARSET: u8 = 68;
pub const ISC_DPB_PROCESS_ID: u8 = 71;
pub const ISC_DPB_NO_DB_TRIGGERS: u8 = 72;
pub const ISC_DPB_TRUSTED_AUTH: u8 = 73;
pub const ISC_DPB_PROCESS_NAME: u8 = 74;
pub const ISC_DPB_UTF8_FILENAME: u8 = 77;
pub const ISC_DPB_CLIENT_VERSION: u8 = 80;
pub const ISC_DPB_SPECIFIC_AUTH_DATA: u8 = 84;
pub const ISC_DPB_AUTH_PLUGIN_LIST: u8 = 85;
pub const ISC_DPB_AUTH_PLUGIN_NAME: u8 = 86;

// Transaction parameter buffer tags.
pub const ISC_TPB_VERSION3: u8 = 3;
pub const ISC_TPB_CONSISTENCY: u8 = 1;
pub const ISC_TPB_CONCURRENCY: u8 = 2;
pub const ISC_TPB_WAIT: u8 = 6;
pub const ISC_TPB_NOWAIT: u8 = 7;
pub const ISC_TPB_READ: u8 = 8;
pub const ISC_TPB_WRITE: u8 = 9;
pub const ISC_TPB_READ_COMMITTED: u8 = 15;
pub const ISC_TPB_AUTOCOMMIT: u8 = 16;
pub const ISC_TPB_REC_VERSION: u8 = 17;
pub const ISC_TPB_NO_REC_VERSION: u8 = 18;
pub const ISC_TPB_NO_AUTO_UNDO: u8 = 20;
pub const ISC_TPB_LOCK_TIMEOUT: u8 = 21;

// Service parameter buffer tags.
pub const ISC_SPB_VERSION: u8 = 2;
pub const ISC_SPB_USER_NAME: u8 = ISC_DPB_USER_NAME;
pub const ISC_SPB_PASSWORD: u8 = ISC_DPB_PASSWORD;
pub const ISC_SPB_PASSWORD_ENC: u8 = ISC_DPB_PASSWORD_ENC;
pub const ISC_SPB_COMMAND_LINE: u8 = 105;
pub const ISC_SPB_DBNAME: u8 = 106;
pub const ISC_SPB_VERBOSE: u8 = 107;
pub const ISC_SPB_OPTIONS: u8 = 108;
pub const ISC_SPB_SPECIFIC_AUTH_DATA: u8 = 111;

// Event parameter buffer.
pub const EPB_VERSION1: u8 = 1;

// Statement free options.
pub const DSQL_CLOSE: i32 = 1;
pub const DSQL_DROP: i32 = 2;

// Information call result framing.
pub const ISC_INFO_END: u8 = 1;
pub const ISC_INFO_TRUNCATED: u8 = 2;
pub const ISC_INFO_ERROR: u8 = 3;
pub const ISC_INFO_DATA_NOT_READY: u8 = 4;
pub const ISC_INFO_FLAG_END: u8 = 127;

// Database information items.
pub const ISC_INFO_DB_ID: u8 = 4;
pub const ISC_INFO_ODS_VERSION: u8 = 32;
pub const ISC_INFO_ODS_MINOR_VERSION: u8 = 33;
pub const ISC_INFO_DB_SQL_DIALECT: u8 = 62;
pub const ISC_INFO_FIREBIRD_VERSION: u8 = 103;

// SQL information items.
pub const ISC_INFO_SQL_SELECT: u8 = 4;
pub const ISC_INFO_SQL_BIND: u8 = 5;
pub const ISC_INFO_SQL_NUM_VARIABLES: u8 = 6;
pub const ISC_INFO_SQL_DESCRIBE_VARS: u8 = 7;
pub const ISC_INFO_SQL_DESCRIBE_END: u8 = 8;
pub const ISC_INFO_SQL_SQLDA_SEQ: u8 = 9;
pub const ISC_INFO_SQL_TYPE: u8 = 11;
pub const ISC_INFO_SQL_SUB_TYPE: u8 = 12;
pub const ISC_INFO_SQL_SCALE: u8 = 13;
pub const ISC_INFO_SQL_LENGTH: u8 = 14;
pub const ISC_INFO_SQL_FIELD: u8 = 16;
pub const ISC_INFO_SQL_RELATION: u8 = 17;
pub const ISC_INFO_SQL_OWNER: u8 = 18;
pub const ISC_INFO_SQL_ALIAS: u8 = 19;
pub const ISC_INFO_SQL_SQLDA_START: u8 = 20;
pub const ISC_INFO_SQL_STMT_TYPE: u8 = 21;
pub const ISC_INFO_SQL_RECORDS: u8 = 23;

// Statement types from isc_info_sql_stmt_type.
pub const ISC_INFO_SQL_STMT_SELECT: i32 = 1;
pub const ISC_INFO_SQL_STMT_INSERT: i32 = 2;
pub const ISC_INFO_SQL_STMT_UPDATE: i32 = 3;
pub const ISC_INFO_SQL_STMT_DELETE: i32 = 4;
pub const ISC_INFO_SQL_STMT_DDL: i32 = 5;
pub const ISC_INFO_SQL_STMT_EXEC_PROCEDURE: i32 = 8;
pub const ISC_INFO_SQL_STMT_START_TRANS: i32 = 9;
pub const ISC_INFO_SQL_STMT_COMMIT: i32 = 10;
pub const ISC_INFO_SQL_STMT_ROLLBACK: i32 = 11;
pub const ISC_INFO_SQL_STMT_SELECT_FOR_UPD: i32 = 12;
pub const ISC_INFO_SQL_STMT_SET_GENERATOR: i32 = 13;
pub const ISC_INFO_SQL_STMT_SAVEPOINT: i32 = 14;

// Per-request record counts inside isc_info_sql_records.
pub const ISC_INFO_REQ_SELECT_COUNT: u8 = 13;
pub const ISC_INFO_REQ_INSERT_COUNT: u8 = 14;
pub const ISC_INFO_REQ_UPDATE_COUNT: u8 = 15;
pub const ISC_INFO_REQ_DELETE_COUNT: u8 = 16;

// Info call buffer sizes.
pub const PREPARE_INFO_BUFFER_SIZE: i32 = 32768;
pub const STATEMENT_TYPE_BUFFER_SIZE: i32 = 8;
pub const ROWS_AFFECTED_BUFFER_SIZE: i32 = 34;

// SQL data type codes. The low bit flags a nullable field and is masked off.
pub const SQL_TEXT: i16 = 452;
pub const SQL_VARYING: i16 = 448;
pub const SQL_SHORT: i16 = 500;
pub const SQL_LONG: i16 = 496;
pub const SQL_FLOAT: i16 = 482;
pub const SQL_DOUBLE: i16 = 480;
pub const SQL_D_FLOAT: i16 = 530;
pub const SQL_TIMESTAMP: i16 = 510;
pub const SQL_BLOB: i16 = 520;
pub const SQL_ARRAY: i16 = 540;
pub const SQL_QUAD: i16 = 550;
pub const SQL_TYPE_TIME: i16 = 560;
pub const SQL_TYPE_DATE: i16 = 570;
pub const SQL_INT64: i16 = 580;
pub const SQL_BOOLEAN: i16 = 32764;
pub const SQL_NULL: i16 = 32766;

// BLR codes used when describing message formats.
pub const BLR_VERSION5: u8 = 5;
pub const BLR_BEGIN: u8 = 2;
pub const BLR_MESSAGE: u8 = 4;
pub const BLR_EOC: u8 = 76;
pub const BLR_END: u8 = 255;
pub const BLR_TEXT: u8 = 14;
pub const BLR_SHORT: u8 = 7;
pub const BLR_LONG: u8 = 8;
pub const BLR_QUAD: u8 = 9;
pub const BLR_INT64: u8 = 16;
pub const BLR_FLOAT: u8 = 10;
pub const BLR_D_FLOAT: u8 = 11;
pub const BLR_DOUBLE: u8 = 27;
pub const BLR_TIMESTAMP: u8 = 35;
pub const BLR_VARYING: u8 = 37;
pub const BLR_SQL_DATE: u8 = 12;
pub const BLR_SQL_TIME: u8 = 13;
pub const BLR_BOOL: u8 = 23;

// Status vector argument types.
pub const ISC_ARG_END: i32 = 0;
pub const ISC_ARG_GDS: i32 = 1;
pub const ISC_ARG_STRING: i32 = 2;
pub const ISC_ARG_NUMBER: i32 = 4;
pub const ISC_ARG_INTERPRETED: i32 = 5;
pub const ISC_ARG_WARNING: i32 = 18;
pub const ISC_ARG_SQL_STATE: i32 = 19;

// Status codes.
pub const ISC_ARITH_EXCEPT: i32 = 335544321;
pub const ISC_DSQL_ERROR: i32 = 335544569;
pub const ISC_CONNECT_REJECT: i32 = 335544421;
pub const ISC_NET_READ_ERR: i32 = 335544726;
pub const ISC_NET_WRITE_ERR: i32 = 335544727;
pub const ISC_STRING_TRUNCATION: i32 = 335544914;
pub const ISC_WIRECRYPT_INCOMPATIBLE: i32 = 335545064;

// Out of band cancel kinds.
pub const FB_CANCEL_DISABLE: i32 = 1;
pub const FB_CANCEL_ENABLE: i32 = 2;
pub const FB_CANCEL_RAISE: i32 = 3;
pub const FB_CANCEL_ABORT: i32 = 4;

// Cooperative identifiers during attach.
pub const DATABASE_OBJECT_ID: i32 = 0;
pub const INCARNATION: i32 = 0;

/// Placeholder handle for requests pipelined before their allocation
/// response arrived.
pub const INVALID_OBJECT: i32 = 0xFFFF;

pub const DEFAULT_FETCH_SIZE: i32 = 200;
pub const DEFAULT_DIALECT: i32 = 3;
pub const SERVICE_MANAGER: &str = "service_mgr";
pub const COMPRESSION_NAME: &str = "zlib";
pub const ENCRYPTION_NAME: &str = "Arc4";

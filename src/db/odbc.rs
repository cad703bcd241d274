//! Native ODBC driver manager binding.
//!
//! Thin safe wrapper over the `odbc-sys` FFI declarations. Only the narrow
//! (`SQLCHAR`) entry points are used; text is exchanged as UTF-8.

use super::{decode_truncated, Diagnostic, Driver, DriverResult, Fetch};
use odbc_sys::{
    AttrOdbcVersion, CDataType, DriverConnectOption, EnvironmentAttribute, HDbc, HEnv, HStmt,
    Handle, HandleType, Len, Nullability, SmallInt, SqlDataType, SqlReturn, ULen, NULL_DATA,
};
use std::ptr;

/// Diagnostic message buffer size (`SQL_MAX_MESSAGE_LENGTH`).
const MAX_MESSAGE_LENGTH: usize = 512;

/// Column name buffer size.
const MAX_COLUMN_NAME_LENGTH: usize = 256;

/// `SQL_NO_TOTAL`: the driver cannot tell the full value length.
const NO_TOTAL: Len = -4;

/// Environment handle owned by [`OdbcDriver`].
#[derive(Debug)]
pub struct OdbcEnv(HEnv);

/// Connection handle owned by [`OdbcDriver`].
#[derive(Debug)]
pub struct OdbcConn(HDbc);

/// Statement handle owned by [`OdbcDriver`].
#[derive(Debug)]
pub struct OdbcStmt(HStmt);

// ODBC handles may be used from any thread as long as a single thread uses
// them at a time; each handle here is owned by exactly one pipeline.
unsafe impl Send for OdbcEnv {}
unsafe impl Send for OdbcConn {}
unsafe impl Send for OdbcStmt {}

/// Driver backed by the system ODBC driver manager (unixODBC, iODBC or odbc32).
#[derive(Debug, Default, Clone, Copy)]
pub struct OdbcDriver;

impl OdbcDriver {
    pub fn new() -> Self {
        Self
    }
}

fn succeeded(ret: SqlReturn) -> bool {
    ret == SqlReturn::SUCCESS || ret == SqlReturn::SUCCESS_WITH_INFO
}

/// Reads the first diagnostic record of a handle.
fn diagnostic(handle_type: HandleType, handle: Handle) -> Diagnostic {
    if handle.is_null() {
        return Diagnostic::new("", "no diagnostic available (null handle)");
    }

    let mut state = [0u8; 6];
    let mut native_error = 0;
    let mut message = [0u8; MAX_MESSAGE_LENGTH];
    let mut message_len: SmallInt = 0;

    let ret = unsafe {
        odbc_sys::SQLGetDiagRec(
            handle_type,
            handle,
            1,
            state.as_mut_ptr(),
            &mut native_error,
            message.as_mut_ptr(),
            MAX_MESSAGE_LENGTH as SmallInt,
            &mut message_len,
        )
    };
    if !succeeded(ret) {
        return Diagnostic::new("", "no diagnostic available");
    }

    let len = usize::try_from(message_len)
        .unwrap_or(0)
        .min(MAX_MESSAGE_LENGTH - 1);
    Diagnostic::new(
        String::from_utf8_lossy(&state[..5]).into_owned(),
        String::from_utf8_lossy(&message[..len]).trim_end().to_string(),
    )
    .with_native_error(native_error)
}

fn check(ret: SqlReturn, handle_type: HandleType, handle: Handle) -> DriverResult<()> {
    if succeeded(ret) {
        Ok(())
    } else {
        Err(diagnostic(handle_type, handle))
    }
}

fn text_len<T: TryFrom<usize>>(text: &str) -> DriverResult<T> {
    T::try_from(text.len()).map_err(|_| Diagnostic::new("HY090", "String length too large"))
}

impl Driver for OdbcDriver {
    type Env = OdbcEnv;
    type Conn = OdbcConn;
    type Stmt = OdbcStmt;

    fn alloc_env(&self) -> DriverResult<OdbcEnv> {
        let mut out: Handle = ptr::null_mut();
        let ret = unsafe { odbc_sys::SQLAllocHandle(HandleType::Env, ptr::null_mut(), &mut out) };
        if !succeeded(ret) || out.is_null() {
            return Err(Diagnostic::new("HY001", "Memory allocation error"));
        }
        Ok(OdbcEnv(out as HEnv))
    }

    fn set_odbc_version(&self, env: &OdbcEnv) -> DriverResult<()> {
        let ret = unsafe {
            odbc_sys::SQLSetEnvAttr(
                env.0,
                EnvironmentAttribute::OdbcVersion,
                AttrOdbcVersion::Odbc3.into(),
                0,
            )
        };
        check(ret, HandleType::Env, env.0 as Handle)
    }

    fn alloc_connection(&self, env: &OdbcEnv) -> DriverResult<OdbcConn> {
        let mut out: Handle = ptr::null_mut();
        let ret = unsafe { odbc_sys::SQLAllocHandle(HandleType::Dbc, env.0 as Handle, &mut out) };
        check(ret, HandleType::Env, env.0 as Handle)?;
        Ok(OdbcConn(out as HDbc))
    }

    fn driver_connect(&self, conn: &OdbcConn, connection_string: &str) -> DriverResult<()> {
        let mut out_len: SmallInt = 0;
        let ret = unsafe {
            odbc_sys::SQLDriverConnect(
                conn.0,
                ptr::null_mut(),
                connection_string.as_ptr(),
                text_len(connection_string)?,
                ptr::null_mut(),
                0,
                &mut out_len,
                DriverConnectOption::NoPrompt,
            )
        };
        check(ret, HandleType::Dbc, conn.0 as Handle)
    }

    fn alloc_statement(&self, conn: &OdbcConn) -> DriverResult<OdbcStmt> {
        let mut out: Handle = ptr::null_mut();
        let ret = unsafe { odbc_sys::SQLAllocHandle(HandleType::Stmt, conn.0 as Handle, &mut out) };
        check(ret, HandleType::Dbc, conn.0 as Handle)?;
        Ok(OdbcStmt(out as HStmt))
    }

    fn prepare(&self, stmt: &OdbcStmt, text: &str) -> DriverResult<()> {
        let ret = unsafe { odbc_sys::SQLPrepare(stmt.0, text.as_ptr(), text_len(text)?) };
        check(ret, HandleType::Stmt, stmt.0 as Handle)
    }

    fn execute(&self, stmt: &OdbcStmt) -> DriverResult<()> {
        let ret = unsafe { odbc_sys::SQLExecute(stmt.0) };
        // NO_DATA: a searched UPDATE/DELETE that matched nothing
        if ret == SqlReturn::NO_DATA {
            return Ok(());
        }
        check(ret, HandleType::Stmt, stmt.0 as Handle)
    }

    fn row_count(&self, stmt: &OdbcStmt) -> DriverResult<i64> {
        let mut count: Len = -1;
        let ret = unsafe { odbc_sys::SQLRowCount(stmt.0, &mut count) };
        check(ret, HandleType::Stmt, stmt.0 as Handle)?;
        Ok(count as i64)
    }

    fn num_result_cols(&self, stmt: &OdbcStmt) -> DriverResult<u16> {
        let mut count: SmallInt = 0;
        let ret = unsafe { odbc_sys::SQLNumResultCols(stmt.0, &mut count) };
        check(ret, HandleType::Stmt, stmt.0 as Handle)?;
        Ok(u16::try_from(count).unwrap_or(0))
    }

    fn describe_col(&self, stmt: &OdbcStmt, column: u16) -> DriverResult<String> {
        let mut name = [0u8; MAX_COLUMN_NAME_LENGTH];
        let mut name_len: SmallInt = 0;
        let mut data_type = SqlDataType::UNKNOWN_TYPE;
        let mut column_size: ULen = 0;
        let mut decimal_digits: SmallInt = 0;
        let mut nullable = Nullability::UNKNOWN;

        let ret = unsafe {
            odbc_sys::SQLDescribeCol(
                stmt.0,
                column,
                name.as_mut_ptr(),
                MAX_COLUMN_NAME_LENGTH as SmallInt,
                &mut name_len,
                &mut data_type,
                &mut column_size,
                &mut decimal_digits,
                &mut nullable,
            )
        };
        check(ret, HandleType::Stmt, stmt.0 as Handle)?;

        let len = usize::try_from(name_len)
            .unwrap_or(0)
            .min(MAX_COLUMN_NAME_LENGTH - 1);
        Ok(String::from_utf8_lossy(&name[..len]).into_owned())
    }

    fn fetch(&self, stmt: &OdbcStmt) -> DriverResult<Fetch> {
        let ret = unsafe { odbc_sys::SQLFetch(stmt.0) };
        if ret == SqlReturn::NO_DATA {
            return Ok(Fetch::Done);
        }
        check(ret, HandleType::Stmt, stmt.0 as Handle)?;
        Ok(Fetch::Row)
    }

    fn get_data(
        &self,
        stmt: &OdbcStmt,
        column: u16,
        capacity: usize,
    ) -> DriverResult<Option<String>> {
        let mut buffer = vec![0u8; capacity.max(1)];
        let mut indicator: Len = 0;

        let ret = unsafe {
            odbc_sys::SQLGetData(
                stmt.0,
                column,
                CDataType::Char,
                buffer.as_mut_ptr().cast(),
                buffer.len() as Len,
                &mut indicator,
            )
        };
        check(ret, HandleType::Stmt, stmt.0 as Handle)?;

        if indicator == NULL_DATA {
            return Ok(None);
        }
        let usable = buffer.len() - 1;
        let len = if indicator == NO_TOTAL {
            usable
        } else {
            usize::try_from(indicator).unwrap_or(0).min(usable)
        };
        Ok(Some(decode_truncated(&buffer, len)))
    }

    fn disconnect(&self, conn: &OdbcConn) {
        unsafe {
            odbc_sys::SQLDisconnect(conn.0);
        }
    }

    fn free_statement(&self, stmt: OdbcStmt) {
        unsafe {
            odbc_sys::SQLFreeHandle(HandleType::Stmt, stmt.0 as Handle);
        }
    }

    fn free_connection(&self, conn: OdbcConn) {
        unsafe {
            odbc_sys::SQLFreeHandle(HandleType::Dbc, conn.0 as Handle);
        }
    }

    fn free_env(&self, env: OdbcEnv) {
        unsafe {
            odbc_sys::SQLFreeHandle(HandleType::Env, env.0 as Handle);
        }
    }
}

//! 制御端末のファイルディスクリプタと、シェルが保存した端末モードを
//! 所有する。このディスクリプタは標準入力を close-on-exec で複製した
//! ものなので、フォークした子が exec を跨いで引き継ぐことはない。

use std::mem::MaybeUninit;
use std::os::unix::io::RawFd;

use crate::error::ShellError;

pub struct Terminal {
    fd: RawFd,
    shell_pgid: libc::pid_t,
    shell_tmodes: libc::termios,
}

impl Terminal {
    /// 標準入力が端末であることを確認し、close-on-exec で複製してから
    /// シェル自身のプロセスグループにフォアグラウンドの所有権を持たせ、
    /// シェルの端末モードを記録する。
    pub fn init() -> Result<Self, ShellError> {
        if unsafe { libc::isatty(libc::STDIN_FILENO) } == 0 {
            return Err(ShellError::NotATerminal);
        }

        let fd = unsafe { libc::dup(libc::STDIN_FILENO) };
        if fd < 0 {
            return Err(ShellError::errno("dup"));
        }
        if unsafe { libc::fcntl(fd, libc::F_SETFD, libc::FD_CLOEXEC) } < 0 {
            return Err(ShellError::errno("fcntl"));
        }

        let shell_pgid = unsafe { libc::getpgrp() };
        if unsafe { libc::tcsetpgrp(fd, shell_pgid) } < 0 {
            return Err(ShellError::errno("tcsetpgrp"));
        }

        let mut shell_tmodes = MaybeUninit::<libc::termios>::uninit();
        if unsafe { libc::tcgetattr(fd, shell_tmodes.as_mut_ptr()) } < 0 {
            return Err(ShellError::errno("tcgetattr"));
        }
        let shell_tmodes = unsafe { shell_tmodes.assume_init() };

        Ok(Self {
            fd,
            shell_pgid,
            shell_tmodes,
        })
    }

    /// `pgid` を端末のフォアグラウンドプロセスグループにする。
    pub fn acquire(&self, pgid: libc::pid_t) {
        unsafe {
            libc::tcsetpgrp(self.fd, pgid);
        }
    }

    /// シェル自身のグループを再びフォアグラウンドにし、保存しておいた
    /// シェルの端末モードを復元する。
    pub fn restore_shell(&self) {
        unsafe {
            libc::tcsetpgrp(self.fd, self.shell_pgid);
            libc::tcsetattr(self.fd, libc::TCSADRAIN, &self.shell_tmodes);
        }
    }

    /// シェル自身が保存している端末モードのスナップショット。新しく
    /// 作るジョブの `tmodes` フィールドの初期値として使う。
    pub fn shell_tmodes(&self) -> libc::termios {
        self.shell_tmodes
    }

    pub fn fd(&self) -> RawFd {
        self.fd
    }

    /// `modes` を制御端末に適用する。resume がフォアグラウンドを渡す前に
    /// 保存済みのモードを書き戻すために使う。
    pub fn set_attrs(&self, modes: &libc::termios) {
        unsafe {
            libc::tcsetattr(self.fd, libc::TCSADRAIN, modes);
        }
    }
}

impl Drop for Terminal {
    fn drop(&mut self) {
        unsafe {
            libc::close(self.fd);
        }
    }
}

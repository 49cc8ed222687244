/// A signing-related git configuration key. Declaration order is the order
/// in which keys are processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ManagedKey {
    UserName,
    UserEmail,
    SigningKey,
    GpgFormat,
    CommitGpgSign,
    TagGpgSign,
    PushGpgSign,
    AllowedSignersFile,
}

impl ManagedKey {
    pub const ALL: [ManagedKey; 8] = [
        ManagedKey::UserName,
        ManagedKey::UserEmail,
        ManagedKey::SigningKey,
        ManagedKey::GpgFormat,
        ManagedKey::CommitGpgSign,
        ManagedKey::TagGpgSign,
        ManagedKey::PushGpgSign,
        ManagedKey::AllowedSignersFile,
    ];

    /// The dotted name understood by `git config`.
    pub const fn git_key(self) -> &'static str {
        match self {
            ManagedKey::UserName => "user.name",
            ManagedKey::UserEmail => "user.email",
            ManagedKey::SigningKey => "user.signingkey",
            ManagedKey::GpgFormat => "gpg.format",
            ManagedKey::CommitGpgSign => "commit.gpgsign",
            ManagedKey::TagGpgSign => "tag.gpgsign",
            ManagedKey::PushGpgSign => "push.gpgsign",
            ManagedKey::AllowedSignersFile => "gpg.ssh.allowedSignersFile",
        }
    }

    /// The name the original value is persisted under between phases.
    pub const fn state_name(self) -> &'static str {
        match self {
            ManagedKey::UserName => "gitUserName",
            ManagedKey::UserEmail => "gitUserEmail",
            ManagedKey::SigningKey => "gitSigningKey",
            ManagedKey::GpgFormat => "gitGpgFormat",
            ManagedKey::CommitGpgSign => "gitCommitGpgSign",
            ManagedKey::TagGpgSign => "gitTagGpgSign",
            ManagedKey::PushGpgSign => "gitPushGpgSign",
            ManagedKey::AllowedSignersFile => "gitAllowedSignersFile",
        }
    }

    pub fn git_keys() -> impl Iterator<Item = &'static str> {
        Self::ALL.into_iter().map(Self::git_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn names_are_unique() {
        let git: HashSet<_> = ManagedKey::git_keys().collect();
        let state: HashSet<_> = ManagedKey::ALL.iter().map(|k| k.state_name()).collect();
        assert_eq!(git.len(), ManagedKey::ALL.len());
        assert_eq!(state.len(), ManagedKey::ALL.len());
    }
}

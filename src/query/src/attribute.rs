//! Canonical attribute identifiers
//!
//! Every attribute name coming from a filter is folded to the OID of the
//! attribute type it denotes before it reaches either evaluator. Names the
//! table does not know pass through untouched.

/// Attribute types the gateway understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Attribute {
    DomainComponent,
    ObjectClass,
    OrganizationalUnit,
    Uid,
    CommonName,
    Surname,
    GivenName,
    DisplayName,
    Mail,
    Description,
    Member,
    MemberOf,
}

impl Attribute {
    pub const ALL: [Attribute; 12] = [
        Attribute::DomainComponent,
        Attribute::ObjectClass,
        Attribute::OrganizationalUnit,
        Attribute::Uid,
        Attribute::CommonName,
        Attribute::Surname,
        Attribute::GivenName,
        Attribute::DisplayName,
        Attribute::Mail,
        Attribute::Description,
        Attribute::Member,
        Attribute::MemberOf,
    ];

    /// Canonical identifier (OID)
    pub fn oid(&self) -> &'static str {
        match self {
            Attribute::DomainComponent => "0.9.2342.19200300.100.1.25",
            Attribute::ObjectClass => "2.5.4.0",
            Attribute::OrganizationalUnit => "2.5.4.11",
            Attribute::Uid => "0.9.2342.19200300.100.1.1",
            Attribute::CommonName => "2.5.4.3",
            Attribute::Surname => "2.5.4.4",
            Attribute::GivenName => "2.5.4.42",
            Attribute::DisplayName => "2.16.840.1.113730.3.1.241",
            Attribute::Mail => "0.9.2342.19200300.100.1.3",
            Attribute::Description => "2.5.4.13",
            Attribute::Member => "2.5.4.31",
            Attribute::MemberOf => "1.2.840.113556.1.2.102",
        }
    }

    /// Preferred short name
    pub fn name(&self) -> &'static str {
        match self {
            Attribute::DomainComponent => "dc",
            Attribute::ObjectClass => "objectClass",
            Attribute::OrganizationalUnit => "ou",
            Attribute::Uid => "uid",
            Attribute::CommonName => "cn",
            Attribute::Surname => "sn",
            Attribute::GivenName => "gn",
            Attribute::DisplayName => "displayName",
            Attribute::Mail => "mail",
            Attribute::Description => "description",
            Attribute::Member => "member",
            Attribute::MemberOf => "memberOf",
        }
    }

    /// Look up an attribute by any of its names or OIDs, ignoring case
    pub fn lookup(name: &str) -> Option<Attribute> {
        let attribute = match name.trim().to_ascii_lowercase().as_str() {
            "dc" | "domaincomponent" | "0.9.2342.19200300.100.1.25" => Attribute::DomainComponent,
            "objectclass" | "2.5.4.0" => Attribute::ObjectClass,
            "ou" | "organizationalunitname" | "2.5.4.11" => Attribute::OrganizationalUnit,
            "uid" | "userid" | "0.9.2342.19200300.100.1.1" => Attribute::Uid,
            "cn" | "commonname" | "2.5.4.3" => Attribute::CommonName,
            "sn" | "surname" | "2.5.4.4" => Attribute::Surname,
            "gn" | "givenname" | "2.5.4.42" => Attribute::GivenName,
            "displayname" | "2.16.840.1.113730.3.1.241" => Attribute::DisplayName,
            "mail" | "rfc822mailbox" | "0.9.2342.19200300.100.1.3" => Attribute::Mail,
            "description" | "2.5.4.13" => Attribute::Description,
            "member" | "uniquemember" | "2.5.4.31" | "2.5.4.50" => Attribute::Member,
            "memberof" | "1.2.840.113556.1.2.102" => Attribute::MemberOf,
            _ => return None,
        };
        Some(attribute)
    }

    /// Resolve an already-canonical identifier
    pub fn from_oid(oid: &str) -> Option<Attribute> {
        Attribute::ALL.into_iter().find(|a| a.oid() == oid)
    }
}

/// Fold an attribute name to its canonical identifier
///
/// Total and idempotent; unknown names are returned unchanged.
pub fn normalize_attribute(name: &str) -> String {
    match Attribute::lookup(name) {
        Some(attribute) => attribute.oid().to_string(),
        None => name.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synonyms_share_identifier() {
        assert_eq!(normalize_attribute("cn"), normalize_attribute("commonName"));
        assert_eq!(normalize_attribute("SN"), normalize_attribute("surname"));
        assert_eq!(normalize_attribute("gn"), normalize_attribute("GivenName"));
        assert_eq!(normalize_attribute("member"), normalize_attribute("uniqueMember"));
        assert_eq!(normalize_attribute("dc"), normalize_attribute("domainComponent"));
    }

    #[test]
    fn test_member_of_uses_de_facto_oid() {
        assert_eq!(normalize_attribute("memberOf"), "1.2.840.113556.1.2.102");
        assert_eq!(normalize_attribute("MEMBEROF"), "1.2.840.113556.1.2.102");
    }

    #[test]
    fn test_normalization_is_idempotent() {
        for attribute in Attribute::ALL {
            let once = normalize_attribute(attribute.name());
            assert_eq!(normalize_attribute(&once), once);
            assert_eq!(Attribute::from_oid(&once), Some(attribute));
        }
    }

    #[test]
    fn test_unknown_names_pass_through() {
        assert_eq!(normalize_attribute("telephoneNumber"), "telephoneNumber");
        assert_eq!(Attribute::from_oid("telephoneNumber"), None);
    }
}

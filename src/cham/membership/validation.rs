use super::{Application, MembershipForm, Receipt};
use crate::cham::{
    backend::{MaritalStatus, NewProfile, PaymentMethod, Title},
    countries,
};
use chrono::{Datelike, NaiveDate};
use thiserror::Error;

pub const MINIMUM_AGE: i32 = 16;
pub const MINIMUM_PASSWORD_LEN: usize = 8;
const MAX_CHILDREN: u32 = 30;

/// The first rule an application breaks. Messages are shown to applicants
/// as is.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("اختر السيد/السيدة")]
    MissingTitle,
    #[error("الاسم باللاتيني مطلوب")]
    MissingFirstNameLatin,
    #[error("الكنية باللاتيني مطلوبة")]
    MissingLastNameLatin,
    #[error("الاسم باللاتيني يجب أن يحتوي أحرف A-Z")]
    FirstNameNotLatin,
    #[error("الكنية باللاتيني يجب أن تحتوي أحرف A-Z")]
    LastNameNotLatin,
    #[error("الاسم بالعربي يجب أن يحتوي حروف عربية")]
    FirstNameNotArabic,
    #[error("الكنية بالعربي يجب أن تحتوي حروف عربية")]
    LastNameNotArabic,
    #[error("تاريخ الميلاد مطلوب")]
    MissingDateOfBirth,
    #[error("تاريخ الميلاد غير صحيح")]
    InvalidDateOfBirth,
    #[error("الانتساب متاح لمن عمره 16 سنة فما فوق")]
    TooYoung,
    #[error("يرجى تحديد الحالة العائلية")]
    MissingMaritalStatus,
    #[error("عدد الأولاد يجب أن يكون رقماً صحيحاً أو 0")]
    InvalidChildrenCount,
    #[error("عدد الأولاد يتجاوز الحد المسموح (30)")]
    TooManyChildren,
    #[error("اسم ورقم الشارع مطلوب")]
    MissingStreet,
    #[error("الرمز البريدي مطلوب")]
    MissingPostalCode,
    #[error("المدينة مطلوبة")]
    MissingCity,
    #[error("الدولة مطلوبة")]
    MissingCountry,
    #[error("الدولة غير معروفة")]
    UnknownCountry,
    #[error("البريد الإلكتروني غير صحيح")]
    InvalidEmail,
    #[error("رقم الهاتف مطلوب")]
    MissingPhone,
    #[error("رمز الاتصال الدولي غير معروف")]
    UnknownDialCode,
    #[error("كلمة المرور يجب أن تتكون من 8 أحرف على الأقل")]
    PasswordTooShort,
    #[error("وسيلة الدفع غير صحيحة")]
    InvalidPaymentMethod,
    #[error("رفع الإيصال مطلوب للدفع اليدوي")]
    MissingReceipt,
    #[error("الإيصال يجب أن يكون ملف PDF أو صورة")]
    ReceiptType,
    #[error("حجم الإيصال يتجاوز الحد المسموح")]
    ReceiptTooLarge,
}

pub fn has_latin(s: &str) -> bool {
    s.chars().any(|c| c.is_ascii_alphabetic())
}

pub fn has_arabic(s: &str) -> bool {
    s.chars().any(|c| ('\u{0600}'..='\u{06FF}').contains(&c))
}

/// Lowercased, trimmed address with both an `@` and a `.`.
pub fn normalize_email(email: &str) -> Option<String> {
    let email = email.trim().to_lowercase();
    (email.contains('@') && email.contains('.')).then_some(email)
}

/// Whole years between `dob` and `today`.
pub fn age_on(dob: NaiveDate, today: NaiveDate) -> i32 {
    let mut age = today.year() - dob.year();
    if (today.month(), today.day()) < (dob.month(), dob.day()) {
        age -= 1;
    }
    age
}

fn optional(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

fn parse_title(value: &str) -> Option<Title> {
    match value.trim() {
        "mr" => Some(Title::Mr),
        "mrs" => Some(Title::Mrs),
        _ => None,
    }
}

fn parse_marital_status(value: &str) -> Option<MaritalStatus> {
    match value.trim() {
        "single" => Some(MaritalStatus::Single),
        "married" => Some(MaritalStatus::Married),
        _ => None,
    }
}

fn parse_children_count(value: &str) -> Result<u32, ValidationError> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(0);
    }
    let count = value
        .parse::<u32>()
        .map_err(|_| ValidationError::InvalidChildrenCount)?;
    if count > MAX_CHILDREN {
        return Err(ValidationError::TooManyChildren);
    }
    Ok(count)
}

fn parse_payment_method(value: &str) -> Result<PaymentMethod, ValidationError> {
    match value.trim() {
        "" | "card" => Ok(PaymentMethod::Card),
        "manual" => Ok(PaymentMethod::Manual),
        "waiver" => Ok(PaymentMethod::Waiver),
        _ => Err(ValidationError::InvalidPaymentMethod),
    }
}

/// Runs every rule in form order and returns the first failure.
pub fn validate(
    form: &MembershipForm,
    receipt: Option<Receipt>,
    today: NaiveDate,
    max_receipt_bytes: usize,
) -> Result<Application, ValidationError> {
    let title = parse_title(&form.title).ok_or(ValidationError::MissingTitle)?;

    let first_name_latin = form.first_name_latin.trim();
    let last_name_latin = form.last_name_latin.trim();
    if first_name_latin.is_empty() {
        return Err(ValidationError::MissingFirstNameLatin);
    }
    if last_name_latin.is_empty() {
        return Err(ValidationError::MissingLastNameLatin);
    }
    if !has_latin(first_name_latin) {
        return Err(ValidationError::FirstNameNotLatin);
    }
    if !has_latin(last_name_latin) {
        return Err(ValidationError::LastNameNotLatin);
    }

    let first_name_ar = optional(&form.first_name_ar);
    let last_name_ar = optional(&form.last_name_ar);
    if first_name_ar.as_deref().is_some_and(|name| !has_arabic(name)) {
        return Err(ValidationError::FirstNameNotArabic);
    }
    if last_name_ar.as_deref().is_some_and(|name| !has_arabic(name)) {
        return Err(ValidationError::LastNameNotArabic);
    }

    let dob = form.date_of_birth.trim();
    if dob.is_empty() {
        return Err(ValidationError::MissingDateOfBirth);
    }
    let date_of_birth = NaiveDate::parse_from_str(dob, "%Y-%m-%d")
        .map_err(|_| ValidationError::InvalidDateOfBirth)?;
    if age_on(date_of_birth, today) < MINIMUM_AGE {
        return Err(ValidationError::TooYoung);
    }

    let marital_status =
        parse_marital_status(&form.marital_status).ok_or(ValidationError::MissingMaritalStatus)?;
    let children_count = parse_children_count(&form.children_count)?;
    let mut children_names = form
        .children_names
        .iter()
        .take(children_count as usize)
        .map(|name| name.trim().to_string())
        .collect::<Vec<_>>();
    children_names.resize(children_count as usize, String::new());

    let (spouse_first_name, spouse_last_name) = match marital_status {
        MaritalStatus::Married => (
            optional(&form.spouse_first_name),
            optional(&form.spouse_last_name),
        ),
        MaritalStatus::Single => (None, None),
    };

    let street = optional(&form.street).ok_or(ValidationError::MissingStreet)?;
    let postal_code = optional(&form.postal_code).ok_or(ValidationError::MissingPostalCode)?;
    let city = optional(&form.city).ok_or(ValidationError::MissingCity)?;
    let country = optional(&form.country).ok_or(ValidationError::MissingCountry)?;
    let country = countries::country_by_iso2(&country).ok_or(ValidationError::UnknownCountry)?;

    let email = normalize_email(&form.email).ok_or(ValidationError::InvalidEmail)?;

    let phone_number = optional(&form.phone_number).ok_or(ValidationError::MissingPhone)?;
    let dial = match optional(&form.phone_country) {
        Some(dial) if countries::is_known_dial(&dial) => dial,
        Some(_) => return Err(ValidationError::UnknownDialCode),
        None => countries::default_dial_for(country.iso2).to_string(),
    };

    let password = match form.password.as_str() {
        "" => None,
        password if password.chars().count() < MINIMUM_PASSWORD_LEN => {
            return Err(ValidationError::PasswordTooShort);
        }
        password => Some(password.to_string()),
    };

    let payment_method = parse_payment_method(&form.payment_method)?;
    let receipt = match payment_method {
        PaymentMethod::Manual => {
            let receipt = receipt.ok_or(ValidationError::MissingReceipt)?;
            if !receipt.is_pdf_or_image() {
                return Err(ValidationError::ReceiptType);
            }
            if receipt.bytes.len() > max_receipt_bytes {
                return Err(ValidationError::ReceiptTooLarge);
            }
            Some(receipt)
        }
        _ => None,
    };

    Ok(Application {
        profile: NewProfile {
            user_id: None,
            title,
            first_name_latin: first_name_latin.to_string(),
            last_name_latin: last_name_latin.to_string(),
            first_name_ar,
            last_name_ar,
            date_of_birth,
            marital_status,
            children_count,
            spouse_first_name,
            spouse_last_name,
            children_names,
            street,
            postal_code,
            city,
            country: country.iso2.to_string(),
            email,
            phone: format!("{dial} {phone_number}"),
        },
        password,
        payment_method,
        receipt,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use rstest::rstest;

    pub(crate) fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 18).unwrap()
    }

    pub(crate) fn valid_form() -> MembershipForm {
        MembershipForm {
            title: "mr".to_string(),
            first_name_latin: "Mohamed".to_string(),
            last_name_latin: "Ali".to_string(),
            date_of_birth: "1990-05-04".to_string(),
            marital_status: "single".to_string(),
            children_count: "0".to_string(),
            street: "10 Rue Victor Hugo".to_string(),
            postal_code: "75000".to_string(),
            city: "Paris".to_string(),
            country: "FR".to_string(),
            email: "  Mohamed.Ali@Example.com ".to_string(),
            phone_country: "+33".to_string(),
            phone_number: "612345678".to_string(),
            payment_method: "card".to_string(),
            ..MembershipForm::default()
        }
    }

    fn pdf(len: usize) -> Receipt {
        Receipt {
            file_name: Some("receipt.pdf".to_string()),
            content_type: "application/pdf".to_string(),
            bytes: vec![0; len],
        }
    }

    fn check(form: &MembershipForm) -> Result<Application, ValidationError> {
        validate(form, None, today(), 1024)
    }

    #[test]
    fn valid_form_is_normalized() {
        let application = check(&valid_form()).unwrap();
        assert_eq!(application.profile.email, "mohamed.ali@example.com");
        assert_eq!(application.profile.phone, "+33 612345678");
        assert_eq!(application.profile.title, Title::Mr);
        assert_eq!(application.payment_method, PaymentMethod::Card);
        assert!(application.password.is_none());
        assert!(application.receipt.is_none());
    }

    #[rstest]
    #[case::missing_title(|f: &mut MembershipForm| f.title.clear(), ValidationError::MissingTitle)]
    #[case::bogus_title(|f: &mut MembershipForm| f.title = "dr".into(), ValidationError::MissingTitle)]
    #[case::blank_first_name(|f: &mut MembershipForm| f.first_name_latin = "  ".into(), ValidationError::MissingFirstNameLatin)]
    #[case::blank_last_name(|f: &mut MembershipForm| f.last_name_latin.clear(), ValidationError::MissingLastNameLatin)]
    #[case::arabic_in_latin_first(|f: &mut MembershipForm| f.first_name_latin = "محمد".into(), ValidationError::FirstNameNotLatin)]
    #[case::digits_in_latin_last(|f: &mut MembershipForm| f.last_name_latin = "123".into(), ValidationError::LastNameNotLatin)]
    #[case::latin_in_arabic_first(|f: &mut MembershipForm| f.first_name_ar = "Mohamed".into(), ValidationError::FirstNameNotArabic)]
    #[case::latin_in_arabic_last(|f: &mut MembershipForm| f.last_name_ar = "Ali".into(), ValidationError::LastNameNotArabic)]
    #[case::missing_dob(|f: &mut MembershipForm| f.date_of_birth.clear(), ValidationError::MissingDateOfBirth)]
    #[case::garbage_dob(|f: &mut MembershipForm| f.date_of_birth = "04/05/1990".into(), ValidationError::InvalidDateOfBirth)]
    #[case::missing_marital(|f: &mut MembershipForm| f.marital_status.clear(), ValidationError::MissingMaritalStatus)]
    #[case::negative_children(|f: &mut MembershipForm| f.children_count = "-1".into(), ValidationError::InvalidChildrenCount)]
    #[case::fractional_children(|f: &mut MembershipForm| f.children_count = "1.5".into(), ValidationError::InvalidChildrenCount)]
    #[case::too_many_children(|f: &mut MembershipForm| f.children_count = "31".into(), ValidationError::TooManyChildren)]
    #[case::missing_street(|f: &mut MembershipForm| f.street.clear(), ValidationError::MissingStreet)]
    #[case::missing_postal(|f: &mut MembershipForm| f.postal_code.clear(), ValidationError::MissingPostalCode)]
    #[case::missing_city(|f: &mut MembershipForm| f.city.clear(), ValidationError::MissingCity)]
    #[case::missing_country(|f: &mut MembershipForm| f.country.clear(), ValidationError::MissingCountry)]
    #[case::unknown_country(|f: &mut MembershipForm| f.country = "XX".into(), ValidationError::UnknownCountry)]
    #[case::email_without_at(|f: &mut MembershipForm| f.email = "mohamed.example.com".into(), ValidationError::InvalidEmail)]
    #[case::email_without_dot(|f: &mut MembershipForm| f.email = "mohamed@example".into(), ValidationError::InvalidEmail)]
    #[case::missing_phone(|f: &mut MembershipForm| f.phone_number = " ".into(), ValidationError::MissingPhone)]
    #[case::unknown_dial(|f: &mut MembershipForm| f.phone_country = "+999".into(), ValidationError::UnknownDialCode)]
    #[case::short_password(|f: &mut MembershipForm| f.password = "short".into(), ValidationError::PasswordTooShort)]
    #[case::bogus_method(|f: &mut MembershipForm| f.payment_method = "crypto".into(), ValidationError::InvalidPaymentMethod)]
    #[case::manual_without_receipt(|f: &mut MembershipForm| f.payment_method = "manual".into(), ValidationError::MissingReceipt)]
    fn rejects_invalid_field(
        #[case] break_form: fn(&mut MembershipForm),
        #[case] expected: ValidationError,
    ) {
        let mut form = valid_form();
        break_form(&mut form);
        assert_eq!(check(&form).unwrap_err(), expected);
    }

    #[test]
    fn first_failure_wins() {
        let mut form = valid_form();
        form.title.clear();
        form.email.clear();
        assert_eq!(check(&form).unwrap_err(), ValidationError::MissingTitle);
    }

    #[rstest]
    #[case("2010-10-18", true)]
    #[case("2010-10-19", false)]
    #[case("2010-10-17", true)]
    #[case("2011-01-01", false)]
    #[case("2030-01-01", false)]
    fn sixteenth_birthday_is_the_cutoff(#[case] dob: &str, #[case] accepted: bool) {
        let mut form = valid_form();
        form.date_of_birth = dob.to_string();
        match check(&form) {
            Ok(_) => assert!(accepted, "{dob} should be too young"),
            Err(err) => {
                assert!(!accepted, "{dob} rejected with {err}");
                assert_eq!(err, ValidationError::TooYoung);
            }
        }
    }

    #[test]
    fn age_counts_whole_years() {
        let dob = NaiveDate::from_ymd_opt(2000, 2, 29).unwrap();
        assert_eq!(age_on(dob, NaiveDate::from_ymd_opt(2016, 2, 28).unwrap()), 15);
        assert_eq!(age_on(dob, NaiveDate::from_ymd_opt(2016, 2, 29).unwrap()), 16);
        assert_eq!(age_on(dob, NaiveDate::from_ymd_opt(2017, 3, 1).unwrap()), 17);
    }

    #[test]
    fn arabic_names_are_optional_but_checked() {
        let mut form = valid_form();
        form.first_name_ar = "محمد".to_string();
        form.last_name_ar = "علي".to_string();
        let application = check(&form).unwrap();
        assert_eq!(application.profile.first_name_ar.as_deref(), Some("محمد"));

        form.first_name_ar = "   ".to_string();
        assert!(check(&form).unwrap().profile.first_name_ar.is_none());
    }

    #[test]
    fn children_names_follow_the_count() {
        let mut form = valid_form();
        form.children_count = "3".to_string();
        form.children_names = vec!["Sami".to_string()];
        assert_eq!(
            check(&form).unwrap().profile.children_names,
            vec!["Sami", "", ""]
        );

        form.children_count = "1".to_string();
        form.children_names = vec!["Sami".to_string(), "Lina".to_string()];
        assert_eq!(check(&form).unwrap().profile.children_names, vec!["Sami"]);

        form.children_count = String::new();
        assert!(check(&form).unwrap().profile.children_names.is_empty());
    }

    #[test]
    fn spouse_is_only_kept_when_married() {
        let mut form = valid_form();
        form.spouse_first_name = "Sara".to_string();
        assert!(check(&form).unwrap().profile.spouse_first_name.is_none());

        form.marital_status = "married".to_string();
        assert_eq!(
            check(&form).unwrap().profile.spouse_first_name.as_deref(),
            Some("Sara")
        );
    }

    #[test]
    fn blank_dial_follows_country() {
        let mut form = valid_form();
        form.country = "de".to_string();
        form.phone_country.clear();
        let application = check(&form).unwrap();
        assert_eq!(application.profile.country, "DE");
        assert_eq!(application.profile.phone, "+49 612345678");
    }

    #[test]
    fn manual_payment_checks_the_receipt() {
        let mut form = valid_form();
        form.payment_method = "manual".to_string();

        let application = validate(&form, Some(pdf(10)), today(), 1024).unwrap();
        assert_eq!(application.payment_method, PaymentMethod::Manual);
        assert!(application.receipt.is_some());

        assert_eq!(
            validate(&form, Some(pdf(2048)), today(), 1024).unwrap_err(),
            ValidationError::ReceiptTooLarge
        );

        let text = Receipt {
            content_type: "text/plain".to_string(),
            ..pdf(10)
        };
        assert_eq!(
            validate(&form, Some(text), today(), 1024).unwrap_err(),
            ValidationError::ReceiptType
        );
    }

    #[test]
    fn receipt_is_dropped_for_other_methods() {
        let mut form = valid_form();
        form.payment_method = "waiver".to_string();
        let application = validate(&form, Some(pdf(10)), today(), 1024).unwrap();
        assert_eq!(application.payment_method, PaymentMethod::Waiver);
        assert!(application.receipt.is_none());
    }

    #[test]
    fn long_enough_password_is_kept() {
        let mut form = valid_form();
        form.password = "correct horse".to_string();
        assert_eq!(
            check(&form).unwrap().password.as_deref(),
            Some("correct horse")
        );
    }

    #[test]
    fn email_normalization() {
        assert_eq!(
            normalize_email(" A@B.Com ").as_deref(),
            Some("a@b.com")
        );
        assert!(normalize_email("nope").is_none());
    }
}

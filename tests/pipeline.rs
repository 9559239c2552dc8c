// End-to-end: household export → _clean → acknowledgment summary → letters

use chrono::NaiveDate;
use donor_merge::{
    check_required, clean_export, discover, run_ack, AppConfig, CleanOutcome, InputKind, Journal,
    MailMerge, MembershipSource, Table, ViolationPolicy,
};
use std::fs;

const HOUSEHOLDS: &str = "\
CnBio_ID,CnBio_Title_1,CnBio_First_Name,CnBio_Last_Name,CnBio_Gender,CnBio_Marital_status,\
CnSpSpBio_Title_1,CnSpSpBio_First_Name,CnSpSpBio_Last_Name,CnSpSpBio_Gender,CnSpSpBio_Inactive,\
CnSpSpBio_Deceased,CnAdrSal_Addressee,CnAdrSal_Salutation,CnAdrAll_1_01_City
1001,,John,Smith,Male,Married,Ms.,Jane,Smith,,No,No,,,Austin
1002,Dr.,Ann,Lee,Female,Married,Dr.,Tom,Lee,,No,No,,,Dallas
1003,,,,,,,,,,No,No,Lee Family Trust,Trustees,Houston
1004,Mrs.,Ruth,Bell,Female,Married,Mr.,Carl,Bell,Male,No,Yes,,,El Paso
";

const GIFTS: &str = "\
Constituent ID,Addressee,Salutation,Address line 1,Address line 2,Address line 3,City,State,\
ZIP Code,Gift type,Gift subtype,Amount,Fund description_1,Gift date,Pay Method,Installment Frequency
1001,J Smith,John,1 Main St,,,Austin,TX,78701,Pledge,,$50.00,General,03/01/2024,Check,Monthly
1001,J Smith,John,1 Main St,,,Austin,TX,78701,Cash,,$20.00,General,03/05/2024,Check,
1002,A Lee,Ann,2 Oak Ave,,,Dallas,TX,75201,Cash,,\"$1,000.00\",Library,02/10/2024,Credit Card,
1999,Visitors - Spring Gala,Friend,,,,,,,Cash,,$5.00,General,03/02/2024,Cash,
2000,New Donor,Friend,9 Elm St,,,Waco,TX,76701,Cash,,$10.00,General,03/03/2024,Cash,
";

#[test]
fn test_full_acknowledgment_run() {
    let dir = tempfile::tempdir().unwrap();
    let config = AppConfig::default();
    fs::write(dir.path().join("spring_export.csv"), HOUSEHOLDS).unwrap();
    fs::write(dir.path().join("spring_mail.csv"), GIFTS).unwrap();
    fs::write(
        dir.path().join("thanks.txt"),
        "«Addressee»\nDear «Salutation»,\nThank you for your «Gift type» of $«Amount» to the «Fund description_1» fund.",
    )
    .unwrap();

    let found = check_required(dir.path(), &config.merge).unwrap();
    let export = found.require(InputKind::HouseholdExport).unwrap().to_path_buf();

    // 1. Clean
    let run = clean_export(&export, &config, ViolationPolicy::Halt).unwrap();
    let report = match &run.outcome {
        CleanOutcome::Cleaned(report) => report,
        CleanOutcome::Halted(v) => panic!("unexpected violations: {}", v.summary()),
    };
    assert_eq!(report.households.len(), 4);
    assert_eq!(report.fallthrough_count(), 0);

    let clean = Table::read(run.clean_file.as_ref().unwrap()).unwrap();
    let addressee = clean.column("CnAdrSal_Addressee").unwrap();
    let salutation = clean.column("CnAdrSal_Salutation").unwrap();
    assert_eq!(clean.rows[0][addressee], "Mr. and Ms. John Smith");
    assert_eq!(clean.rows[0][salutation], "Mr. and Ms. Smith");
    assert_eq!(clean.rows[1][addressee], "Dr. Ann Lee and Dr. Tom Lee");
    assert_eq!(clean.rows[2][addressee], "Lee Family Trust");
    assert_eq!(clean.rows[3][addressee], "Mrs. Ruth Bell");
    assert_eq!(clean.headers[12], "Informal_Addressee");
    assert_eq!(clean.rows[0][12], "John and Jane Smith");

    // 2. Acknowledge
    let found = discover(dir.path(), &config.merge).unwrap();
    let clean_path = found.require(InputKind::CleanHouseholds).unwrap().to_path_buf();
    let gifts_path = found.require(InputKind::GiftExport).unwrap().to_path_buf();
    let today = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();

    let ack = run_ack(
        &gifts_path,
        &clean_path,
        &MembershipSource::Skip,
        dir.path(),
        &config.ack,
        today,
    )
    .unwrap();

    let missing_gift: Vec<&str> = ack
        .reconciliation
        .missing_from_gifts
        .iter()
        .map(|m| m.id.as_str())
        .collect();
    assert_eq!(missing_gift, vec!["1003", "1004"]);
    assert_eq!(ack.reconciliation.missing_from_households[0].id, "2000");

    let summary = Table::read(&ack.output).unwrap();
    // 2000 has no cleaned household: reported above, not acknowledged
    assert_eq!(summary.rows.len(), 2);
    assert_eq!(summary.rows[0][0], "1001");
    assert_eq!(summary.rows[0][1], "Mr. and Ms. John Smith");
    assert_eq!(summary.rows[0][9], "pledge");
    assert_eq!(summary.rows[0][11], "50.00");
    assert_eq!(summary.rows[1][11], "1000.00");
    assert!(summary.rows.iter().all(|row| row[0] != "2000"));

    // 3. Merge
    let found = discover(dir.path(), &config.merge).unwrap();
    assert_eq!(found.gift_summary.as_deref(), Some(ack.output.as_path()));
    let template = found.require(InputKind::Template).unwrap().to_path_buf();

    let journal = Journal::open_in_memory().unwrap();
    let outcome = MailMerge::new(dir.path(), &config.merge)
        .with_journal(&journal)
        .run_files(&ack.output, &template)
        .unwrap();
    assert_eq!(outcome.documents, 2);

    let combined = fs::read_to_string(&outcome.combined).unwrap();
    let letters: Vec<&str> = combined.split('\u{000C}').collect();
    assert_eq!(letters.len(), 2);
    assert!(letters[0].starts_with("Mr. and Ms. John Smith\nDear Mr. and Ms. Smith,"));
    assert!(letters[0].contains("your pledge of $50.00 to the General fund"));
    assert!(letters[1].contains("$1000.00 to the Library fund"));
}

#[test]
fn test_membership_column_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let config = AppConfig::default();
    fs::write(dir.path().join("spring_mail.csv"), GIFTS).unwrap();
    fs::write(
        dir.path().join("spring_export_clean.csv"),
        "CnBio_ID,CnAdrSal_Addressee,CnAdrSal_Salutation\n1001,Mr. John Smith,Mr. Smith\n1002,Dr. Ann Lee,Dr. Lee\n",
    )
    .unwrap();
    fs::write(dir.path().join("Fidelis.csv"), "Constituent ID\n1001\n").unwrap();

    let found = discover(dir.path(), &config.merge).unwrap();
    let membership = MembershipSource::File(found.membership.clone().unwrap());
    let today = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();

    let ack = run_ack(
        found.gift_export.as_ref().unwrap(),
        found.clean_households.as_ref().unwrap(),
        &membership,
        dir.path(),
        &config.ack,
        today,
    )
    .unwrap();

    let summary = Table::read(&ack.output).unwrap();
    assert_eq!(summary.rows.len(), 2);
    assert_eq!(summary.headers.last().unwrap(), "Fidelis Society");
    assert_eq!(summary.rows[0][16], "Fidelis Society");
    assert_eq!(summary.rows[1][16], "");
}

#[test]
fn test_latin1_export_round_trips_encoding() {
    let dir = tempfile::tempdir().unwrap();
    let config = AppConfig::default();
    let text = HOUSEHOLDS.replace("Houston", "Peñasco");
    let (bytes, _, _) = encoding_rs::WINDOWS_1252.encode(&text);
    let export = dir.path().join("fall_export.csv");
    fs::write(&export, &bytes[..]).unwrap();

    let run = clean_export(&export, &config, ViolationPolicy::Halt).unwrap();
    let written = fs::read(run.clean_file.unwrap()).unwrap();
    assert!(String::from_utf8(written.clone()).is_err());
    assert!(written.contains(&0xF1));
}
